pub mod tdigest;
