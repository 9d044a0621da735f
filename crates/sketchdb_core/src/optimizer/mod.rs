pub mod expr_rewrite;
