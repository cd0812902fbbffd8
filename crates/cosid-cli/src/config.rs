use core::time::Duration;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use cosid::{DistributorConfig, HOSTNAME_ENV, InstanceId, SnowflakeConfig, TimeUnit};

/// Command line of the `cosid` binary.
///
/// Generator settings are global and apply to every subcommand. They start
/// from the optional JSON file given by `--config` and are overridden by the
/// individual flags or their `COSID_*` environment variables.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cosid",
    version,
    about = "Generate, decode and lease CosId Snowflake ids"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub snowflake: SnowflakeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SnowflakeArgs {
    /// JSON file holding a `SnowflakeConfig`.
    ///
    /// Environment variable: `COSID_CONFIG`
    #[arg(long, env = "COSID_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Milliseconds since the Unix epoch that timestamp zero stands for.
    ///
    /// Environment variable: `COSID_EPOCH_MILLIS`
    #[arg(long, env = "COSID_EPOCH_MILLIS", global = true)]
    pub epoch_millis: Option<u64>,

    /// Resolution of the timestamp field.
    ///
    /// Environment variable: `COSID_TIME_UNIT`
    #[arg(long, env = "COSID_TIME_UNIT", value_enum, global = true)]
    pub time_unit: Option<Unit>,

    /// Keep ids within 53 bits so JavaScript numbers hold them exactly.
    ///
    /// Environment variable: `COSID_SAFE_JAVASCRIPT`
    #[arg(long, env = "COSID_SAFE_JAVASCRIPT", global = true)]
    pub safe_javascript: bool,

    /// Environment variable: `COSID_TIMESTAMP_BITS`
    #[arg(long, env = "COSID_TIMESTAMP_BITS", global = true)]
    pub timestamp_bits: Option<u32>,

    /// Environment variable: `COSID_MACHINE_BITS`
    #[arg(long, env = "COSID_MACHINE_BITS", global = true)]
    pub machine_bits: Option<u32>,

    /// Environment variable: `COSID_SEQUENCE_BITS`
    #[arg(long, env = "COSID_SEQUENCE_BITS", global = true)]
    pub sequence_bits: Option<u32>,

    /// Offset from UTC, in seconds, of friendly id timestamps.
    ///
    /// Environment variable: `COSID_ZONE_OFFSET_SECONDS`
    #[arg(
        long,
        env = "COSID_ZONE_OFFSET_SECONDS",
        global = true,
        allow_negative_numbers = true
    )]
    pub zone_offset_seconds: Option<i32>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate ids with a fixed machine id.
    Generate {
        /// Environment variable: `COSID_MACHINE_ID`
        #[arg(long, env = "COSID_MACHINE_ID", default_value_t = 0)]
        machine_id: u64,

        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        #[arg(long, value_enum, default_value_t = IdFormat::Decimal)]
        format: IdFormat,
    },

    /// Decode ids into timestamp, machine id and sequence.
    Parse {
        /// Format of the given ids.
        #[arg(long, value_enum, default_value_t = IdFormat::Decimal)]
        format: IdFormat,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Convert friendly ids back into numeric ids.
    Friendly {
        #[arg(required = true)]
        friendly_ids: Vec<String>,
    },

    /// Lease a machine id, generate ids with it, then release it.
    Lease(LeaseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LeaseArgs {
    /// How the machine id is obtained.
    ///
    /// Environment variable: `COSID_DISTRIBUTOR`
    #[arg(long, env = "COSID_DISTRIBUTOR", value_enum, default_value_t = DistributorKind::Redis)]
    pub distributor: DistributorKind,

    /// Environment variable: `COSID_NAMESPACE`
    #[arg(long, env = "COSID_NAMESPACE", default_value = "cosid")]
    pub namespace: String,

    /// Environment variable: `COSID_REDIS_URL`
    #[arg(long, env = "COSID_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Host part of the instance identity. Defaults to `$HOSTNAME`.
    ///
    /// Environment variable: `COSID_HOST`
    #[arg(long, env = "COSID_HOST")]
    pub host: Option<String>,

    /// Environment variable: `COSID_PORT`
    #[arg(long, env = "COSID_PORT", default_value_t = 0)]
    pub port: u16,

    /// Keep the lease across restarts, recorded under `--state-dir`.
    ///
    /// Environment variable: `COSID_STABLE`
    #[arg(long, env = "COSID_STABLE")]
    pub stable: bool,

    /// Directory of the local machine state of stable instances.
    ///
    /// Environment variable: `COSID_STATE_DIR`
    #[arg(long, env = "COSID_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Machine id of the `manual` distributor.
    ///
    /// Environment variable: `COSID_MACHINE_ID`
    #[arg(long, env = "COSID_MACHINE_ID")]
    pub machine_id: Option<u64>,

    /// Environment variable: `COSID_TIMEOUT_MS`
    #[arg(long, env = "COSID_TIMEOUT_MS", default_value_t = 5_000)]
    pub timeout_ms: u64,

    /// Age after which a silent lease may be reclaimed, zero to never expire.
    ///
    /// Environment variable: `COSID_SAFE_GUARD_MS`
    #[arg(long, env = "COSID_SAFE_GUARD_MS", default_value_t = 0)]
    pub safe_guard_ms: u64,

    /// Environment variable: `COSID_GUARD_INTERVAL_MS`
    #[arg(long, env = "COSID_GUARD_INTERVAL_MS", default_value_t = 60_000)]
    pub guard_interval_ms: u64,

    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    #[arg(long, value_enum, default_value_t = IdFormat::Decimal)]
    pub format: IdFormat,

    /// Hold the lease this many seconds (or until Ctrl+C) before releasing.
    #[arg(long, default_value_t = 0)]
    pub hold_secs: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millisecond,
    Second,
}

impl From<Unit> for TimeUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Millisecond => Self::Millisecond,
            Unit::Second => Self::Second,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// Plain decimal.
    Decimal,
    /// Decimal, zero padded to 19 digits.
    Padded,
    Base62,
    Base36,
    /// Crockford base-32.
    Crockford,
    /// `{timestamp}-{machine_id}-{sequence}`.
    Friendly,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributorKind {
    /// In-process leases; only useful for trying the protocol out.
    Memory,
    Redis,
    /// Fixed `--machine-id`.
    Manual,
    /// Ordinal suffix of the host name, e.g. `cosid-3`.
    StatefulSet,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub snowflake: SnowflakeConfig,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub enum Action {
    Generate {
        machine_id: u64,
        count: usize,
        format: IdFormat,
    },
    Parse {
        format: IdFormat,
        ids: Vec<String>,
    },
    Friendly {
        friendly_ids: Vec<String>,
    },
    Lease(LeaseConfig),
}

#[derive(Debug, Clone)]
pub struct LeaseConfig {
    pub distributor: DistributorKind,
    pub namespace: String,
    pub redis_url: String,
    pub instance: InstanceId,
    pub state_dir: Option<PathBuf>,
    pub machine_id: Option<u64>,
    pub distributor_config: DistributorConfig,
    pub count: usize,
    pub format: IdFormat,
    pub hold: Duration,
}

impl TryFrom<SnowflakeArgs> for SnowflakeConfig {
    type Error = anyhow::Error;

    fn try_from(args: SnowflakeArgs) -> Result<Self, Self::Error> {
        let mut config = match &args.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => SnowflakeConfig::default(),
        };

        if let Some(epoch_millis) = args.epoch_millis {
            config.epoch_millis = epoch_millis;
        }
        if let Some(unit) = args.time_unit {
            config.time_unit = unit.into();
        }
        config.safe_javascript |= args.safe_javascript;
        config.timestamp_bits = args.timestamp_bits.or(config.timestamp_bits);
        config.machine_bits = args.machine_bits.or(config.machine_bits);
        config.sequence_bits = args.sequence_bits.or(config.sequence_bits);
        if let Some(offset) = args.zone_offset_seconds {
            config.zone_offset_seconds = offset;
        }

        // surface bad widths and offsets before any subcommand runs
        config.parser()?;
        config.synchronizer()?;
        Ok(config)
    }
}

impl TryFrom<LeaseArgs> for LeaseConfig {
    type Error = anyhow::Error;

    fn try_from(args: LeaseArgs) -> Result<Self, Self::Error> {
        if args.namespace.is_empty() {
            bail!("COSID_NAMESPACE must not be empty");
        }
        if args.distributor == DistributorKind::Manual && args.machine_id.is_none() {
            bail!("the manual distributor requires COSID_MACHINE_ID");
        }

        let distributor_config = DistributorConfig {
            timeout: Duration::from_millis(args.timeout_ms),
            safe_guard_duration: Duration::from_millis(args.safe_guard_ms),
            guard_interval: Duration::from_millis(args.guard_interval_ms),
        };
        distributor_config.validate()?;

        let host = args
            .host
            .or_else(|| std::env::var(HOSTNAME_ENV).ok())
            .unwrap_or_else(|| String::from("localhost"));

        Ok(Self {
            distributor: args.distributor,
            namespace: args.namespace,
            redis_url: args.redis_url,
            instance: InstanceId::new(host, args.port, args.stable),
            state_dir: args.state_dir,
            machine_id: args.machine_id,
            distributor_config,
            count: args.count,
            format: args.format,
            hold: Duration::from_secs(args.hold_secs),
        })
    }
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let snowflake = SnowflakeConfig::try_from(args.snowflake)?;
        let action = match args.command {
            Command::Generate {
                machine_id,
                count,
                format,
            } => {
                let max_machine_id = snowflake.layout()?.allocation().max_machine_id();
                if machine_id > max_machine_id {
                    bail!(
                        "COSID_MACHINE_ID ({machine_id}) exceeds the machine id space (max = {max_machine_id})"
                    );
                }
                Action::Generate {
                    machine_id,
                    count,
                    format,
                }
            }
            Command::Parse { format, ids } => Action::Parse { format, ids },
            Command::Friendly { friendly_ids } => Action::Friendly { friendly_ids },
            Command::Lease(lease) => Action::Lease(LeaseConfig::try_from(lease)?),
        };
        Ok(Self { snowflake, action })
    }
}
