use std::collections::HashMap;
use std::sync::LazyLock;

use sketchdb_error::{DbError, Result};

use crate::arrays::scalar::ScalarValue;
use crate::statistics::tdigest::DEFAULT_COMPRESSION;

/// Configuration used when binding and executing aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Compression used for the digest backing approx_percentile.
    pub approx_percentile_compression: u64,
    /// Number of partitions the hash aggregate splits its input into.
    ///
    /// Partial digests are merged across partitions, so estimates depend on
    /// this value. With a single partition every group is folded in input
    /// order.
    pub partitions: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            approx_percentile_compression: DEFAULT_COMPRESSION as u64,
            partitions: DEFAULT_PARTITION_COUNT,
        }
    }
}

impl ExecutionConfig {
    pub fn set_from_scalar(&mut self, name: &str, value: ScalarValue) -> Result<()> {
        let func = get_setting(name)?;
        (func.set)(value, self)
    }

    pub fn get_as_scalar(&self, name: &str) -> Result<ScalarValue> {
        let func = get_setting(name)?;
        Ok((func.get)(self))
    }

    /// Reset a single setting to its default.
    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();
        let func = get_setting(name)?;

        let scalar = (func.get)(&def_conf);
        (func.set)(scalar, self)
    }

    /// Names and descriptions of all settings.
    pub fn settings() -> impl Iterator<Item = (&'static str, &'static str)> {
        GET_SET_FUNCTIONS
            .iter()
            .map(|(name, func)| (*name, func.description))
    }
}

fn get_setting(name: &str) -> Result<&'static SettingFunctions> {
    GET_SET_FUNCTIONS
        .get(name)
        .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))
}

struct SettingFunctions {
    description: &'static str,
    set: fn(scalar: ScalarValue, conf: &mut ExecutionConfig) -> Result<()>,
    get: fn(conf: &ExecutionConfig) -> ScalarValue,
}

impl SettingFunctions {
    const fn new<S: ExecutionSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_scalar as _,
            get: S::get_as_scalar as _,
        }
    }
}

fn insert_setting<S: ExecutionSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<ApproxPercentileCompression>(&mut map);
    insert_setting::<Partitions>(&mut map);

    map
});

pub trait ExecutionSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_scalar(scalar: ScalarValue, conf: &mut ExecutionConfig) -> Result<()>;
    fn get_as_scalar(conf: &ExecutionConfig) -> ScalarValue;
}

/// Get a positive integer from a scalar, erroring for zero or negative values.
fn try_positive(name: &str, scalar: &ScalarValue) -> Result<u64> {
    let val = scalar.try_as_i64()?;
    if val < 1 {
        return Err(DbError::new(format!("Setting '{name}' must be at least 1"))
            .with_field("value", val));
    }
    Ok(val as u64)
}

pub struct ApproxPercentileCompression;

impl ExecutionSetting for ApproxPercentileCompression {
    const NAME: &'static str = "approx_percentile_compression";
    const DESCRIPTION: &'static str =
        "Compression of the digest used by approx_percentile, higher is more accurate";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut ExecutionConfig) -> Result<()> {
        conf.approx_percentile_compression = try_positive(Self::NAME, &scalar)?;
        Ok(())
    }

    fn get_as_scalar(conf: &ExecutionConfig) -> ScalarValue {
        (conf.approx_percentile_compression as i64).into()
    }
}

const DEFAULT_PARTITION_COUNT: u64 = 1;
const MAX_PARTITION_COUNT: usize = 512;

pub struct Partitions;

impl ExecutionSetting for Partitions {
    const NAME: &'static str = "partitions";
    const DESCRIPTION: &'static str =
        "Number of partitions to use during aggregation, estimates may differ between partition counts";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut ExecutionConfig) -> Result<()> {
        let val = try_positive(Self::NAME, &scalar)?;
        if val > MAX_PARTITION_COUNT as u64 {
            return Err(DbError::new(format!(
                "Partition count cannot be greater than {MAX_PARTITION_COUNT}"
            )));
        }

        conf.partitions = val;
        Ok(())
    }

    fn get_as_scalar(conf: &ExecutionConfig) -> ScalarValue {
        (conf.partitions as i64).into()
    }
}
