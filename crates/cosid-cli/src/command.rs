use std::{
    io::{self, BufWriter, Write},
    sync::Arc,
};

use anyhow::{Context, bail};
use cosid::{
    IdConverter, InMemoryLeaseBackend, InMemoryMachineStateStorage, LeaseMachineIdDistributor,
    LocalMachineStateStorage, MachineIdDistributor, MachineIdGuarder, MachineState,
    MachineStateStorage, ManualMachineIdDistributor, RadixIdConverter, SnowflakeConfig,
    SnowflakeFriendlyIdConverter, StatefulSetMachineIdDistributor, StringIdGenerator,
    StringSnowflakeGenerator, ToStringIdConverter,
};
use cosid_redis::RedisLeaseBackend;

use crate::config::{Action, AppConfig, DistributorKind, IdFormat, LeaseConfig};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let AppConfig { snowflake, action } = config;
    match action {
        Action::Generate {
            machine_id,
            count,
            format,
        } => generate(&snowflake, machine_id, count, format),
        Action::Parse { format, ids } => parse(&snowflake, format, &ids),
        Action::Friendly { friendly_ids } => friendly(&snowflake, &friendly_ids),
        Action::Lease(lease_config) => lease(&snowflake, lease_config).await,
    }
}

fn converter(
    format: IdFormat,
    snowflake: &SnowflakeConfig,
) -> anyhow::Result<Box<dyn IdConverter + Send + Sync>> {
    Ok(match format {
        IdFormat::Decimal => Box::new(ToStringIdConverter::new(false)),
        IdFormat::Padded => Box::new(ToStringIdConverter::new(true)),
        IdFormat::Base62 => Box::new(RadixIdConverter::base62(false)),
        IdFormat::Base36 => Box::new(RadixIdConverter::base36(false)),
        IdFormat::Crockford => Box::new(RadixIdConverter::crockford32(false)),
        IdFormat::Friendly => Box::new(SnowflakeFriendlyIdConverter::new(snowflake.parser()?)),
    })
}

fn write_ids(
    snowflake: &SnowflakeConfig,
    machine_id: u64,
    count: usize,
    format: IdFormat,
) -> anyhow::Result<()> {
    let generator =
        StringSnowflakeGenerator::new(snowflake.build(machine_id)?, converter(format, snowflake)?);
    let mut out = BufWriter::new(io::stdout().lock());
    for _ in 0..count {
        writeln!(out, "{}", generator.generate_as_string()?)?;
    }
    out.flush()?;
    Ok(())
}

fn generate(
    snowflake: &SnowflakeConfig,
    machine_id: u64,
    count: usize,
    format: IdFormat,
) -> anyhow::Result<()> {
    tracing::debug!(machine_id, count, ?format, "generating ids");
    write_ids(snowflake, machine_id, count, format)
}

fn parse(snowflake: &SnowflakeConfig, format: IdFormat, ids: &[String]) -> anyhow::Result<()> {
    let converter = converter(format, snowflake)?;
    let parser = snowflake.parser()?;
    let mut out = BufWriter::new(io::stdout().lock());
    for input in ids {
        let state = parser.parse(converter.decode(input)?)?;
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            state.id, state.timestamp, state.machine_id, state.sequence, state.friendly_id
        )?;
    }
    out.flush()?;
    Ok(())
}

fn friendly(snowflake: &SnowflakeConfig, friendly_ids: &[String]) -> anyhow::Result<()> {
    let parser = snowflake.parser()?;
    let mut out = BufWriter::new(io::stdout().lock());
    for input in friendly_ids {
        writeln!(out, "{}", parser.parse_friendly_id(input)?.id)?;
    }
    out.flush()?;
    Ok(())
}

async fn distributor(config: &LeaseConfig) -> anyhow::Result<Arc<dyn MachineIdDistributor>> {
    let storage: Arc<dyn MachineStateStorage> = match &config.state_dir {
        Some(dir) => Arc::new(LocalMachineStateStorage::new(dir.clone())),
        None if config.instance.is_stable() => Arc::new(LocalMachineStateStorage::default()),
        None => Arc::new(InMemoryMachineStateStorage::new()),
    };

    Ok(match config.distributor {
        DistributorKind::Memory => Arc::new(
            LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new())
                .with_storage(storage)
                .with_config(config.distributor_config.clone()),
        ),
        DistributorKind::Redis => {
            let backend = tokio::time::timeout(
                config.distributor_config.timeout,
                RedisLeaseBackend::connect(&config.redis_url),
            )
            .await
            .with_context(|| format!("timed out connecting to {}", config.redis_url))??;
            Arc::new(
                LeaseMachineIdDistributor::new(backend)
                    .with_storage(storage)
                    .with_config(config.distributor_config.clone()),
            )
        }
        DistributorKind::Manual => {
            let Some(machine_id) = config.machine_id else {
                bail!("the manual distributor requires COSID_MACHINE_ID");
            };
            Arc::new(ManualMachineIdDistributor::new(machine_id))
        }
        DistributorKind::StatefulSet => {
            Arc::new(StatefulSetMachineIdDistributor::new(config.instance.host()))
        }
    })
}

async fn lease(snowflake: &SnowflakeConfig, config: LeaseConfig) -> anyhow::Result<()> {
    let machine_bits = snowflake.layout()?.allocation().machine_bits();
    let distributor = distributor(&config).await?;
    let state = distributor
        .distribute(&config.namespace, machine_bits, &config.instance)
        .await?;
    tracing::info!(
        namespace = %config.namespace,
        instance = %config.instance,
        machine_id = state.machine_id,
        "leased machine id"
    );

    let result = use_lease(snowflake, &config, Arc::clone(&distributor), state).await;

    // best effort: a lease that is not released expires or is recovered
    if let Err(error) = distributor.revert(&config.namespace, &config.instance).await {
        tracing::warn!(%error, "failed to release machine id");
    }
    result
}

async fn use_lease(
    snowflake: &SnowflakeConfig,
    config: &LeaseConfig,
    distributor: Arc<dyn MachineIdDistributor>,
    state: MachineState,
) -> anyhow::Result<()> {
    let guarder = (!config.hold.is_zero()).then(|| {
        MachineIdGuarder::spawn(
            distributor,
            config.namespace.clone(),
            config.instance.clone(),
            state,
            config.distributor_config.guard_interval,
        )
    });

    write_ids(snowflake, state.machine_id, config.count, config.format)?;

    let Some(guarder) = guarder else {
        return Ok(());
    };
    tracing::info!(hold = ?config.hold, "holding lease, press Ctrl+C to release");
    tokio::select! {
        () = tokio::time::sleep(config.hold) => {},
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Received Ctrl+C signal");
        },
    }
    let lost = guarder.is_lost();
    guarder.stop().await;
    if lost {
        bail!("machine id {} was lost while held", state.machine_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converters_round_trip_generated_ids() {
        let snowflake = SnowflakeConfig::default();
        let generator = snowflake.build(7).unwrap();
        let id = cosid::IdGenerator::generate(&generator).unwrap();

        for format in [
            IdFormat::Decimal,
            IdFormat::Padded,
            IdFormat::Base62,
            IdFormat::Base36,
            IdFormat::Crockford,
            IdFormat::Friendly,
        ] {
            let converter = converter(format, &snowflake).unwrap();
            let text = converter.encode(id).unwrap();
            assert_eq!(converter.decode(&text).unwrap(), id, "{format:?}");
        }
    }

    #[test]
    fn padded_format_is_fixed_width() {
        let converter = converter(IdFormat::Padded, &SnowflakeConfig::default()).unwrap();
        assert_eq!(converter.encode(42).unwrap().len(), 19);
    }
}
