use {
    crate::ConfigError,
    serde::{Deserialize, Serialize},
    std::{env, str::FromStr},
};

/// Default size of the shared stack, in bytes.
pub const STACK_SIZE: usize = 1024 * 1024;

/// Default number of coroutine slots.
pub const DEFAULT_CAPACITY: usize = 64;

/// Scheduler configuration.
///
/// Every field has a default, so a partial configuration
/// deserializes to a complete one.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config
{
    /// Size of the shared stack, in bytes.
    ///
    /// This bounds the deepest frame any coroutine may have.
    /// It is rounded up to a multiple of the page size.
    pub stack_size: usize,

    /// Number of coroutine slots allocated up front.
    pub capacity: usize,

    /// How the slot table grows when every slot is occupied.
    pub growth: GrowthPolicy,
}

/// How the slot table grows when every slot is occupied.
///
/// In either case the new coroutine receives
/// the lowest of the newly created slots.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthPolicy
{
    /// Add exactly one slot.
    #[default]
    Linear,

    /// Double the number of slots (at least one is added).
    Geometric,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self{
            stack_size: STACK_SIZE,
            capacity: DEFAULT_CAPACITY,
            growth: GrowthPolicy::Linear,
        }
    }
}

impl Config
{
    /// Read the configuration from environment variables.
    ///
    /// See [`Config::from_vars`] for the variables that are read.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_vars(|var| env::var(var).ok())
    }

    /// Read the configuration using the given lookup function.
    ///
    /// The variables `COSHARE_STACK_SIZE`, `COSHARE_CAPACITY`,
    /// and `COSHARE_GROWTH` override the corresponding fields.
    /// Variables for which `lookup` returns [`None`] keep their defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let mut config = Self::default();

        if let Some(value) = lookup("COSHARE_STACK_SIZE") {
            config.stack_size = parse("COSHARE_STACK_SIZE", value)?;
            if config.stack_size == 0 {
                return Err(ConfigError::ZeroStackSize);
            }
        }

        if let Some(value) = lookup("COSHARE_CAPACITY") {
            config.capacity = parse("COSHARE_CAPACITY", value)?;
        }

        if let Some(value) = lookup("COSHARE_GROWTH") {
            config.growth = parse("COSHARE_GROWTH", value)?;
        }

        Ok(config)
    }
}

impl FromStr for GrowthPolicy
{
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s {
            "linear"    => Ok(Self::Linear),
            "geometric" => Ok(Self::Geometric),
            _           => Err(()),
        }
    }
}

fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
    where T: FromStr
{
    let result = value.trim().parse::<T>();
    result.map_err(|_| ConfigError::InvalidValue{var, value})
}
