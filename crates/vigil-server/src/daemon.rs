//! The daemon loop — periodically evaluates switches and performs
//! guardian duty.
//!
//! Each cycle: query the relays for every tracked switch's check-ins and
//! cancellation markers, run the state machine, log the check-in
//! advisory, and — when a guardian key is configured — run the release
//! protocol for every switch that key guards. The evaluator may run
//! concurrently with user-initiated check-ins; the store mutex
//! serializes access to switch state.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use vigil_protocol::guardian::{observe_cancel, observe_latest_checkin, GuardianNode, NoHook};
use vigil_relay::{RelayPool, RelayTransport};
use vigil_switch::heartbeat::{evaluate_advisory, Advisory};
use vigil_switch::store::SwitchStore;
use vigil_switch::{Clock, SystemClock, SwitchStatus};

use crate::config::ServerConfig;

/// Run the daemon loop. Blocks forever (until shutdown signal).
pub async fn run(config: ServerConfig) -> Result<()> {
    log::info!("Vigil server starting…");
    log::info!("  Relays:     {}", config.relays.urls.join(", "));
    log::info!(
        "  Interval:   {} seconds ({:.1} minutes)",
        config.server.poll_interval_secs,
        config.server.poll_interval_secs as f64 / 60.0
    );
    log::info!("  Data dir:   {}", config.server.data_dir.display());
    log::info!(
        "  Guardian:   {}",
        if config.guardian.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data dir: {}",
            config.server.data_dir.display()
        )
    })?;

    let store = Mutex::new(
        SwitchStore::load(config.server.data_dir.join("switches.json"))
            .context("Failed to load switch store")?,
    );

    let interval = Duration::from_secs(config.server.poll_interval_secs);

    let mut first = true;
    loop {
        if !first {
            log::info!(
                "Sleeping {} seconds until next cycle…",
                config.server.poll_interval_secs
            );
            tokio::time::sleep(interval).await;
        }
        first = false;

        match run_check_cycle(&config, &store).await {
            Ok(()) => log::info!("Check cycle completed."),
            Err(e) => log::error!("Check cycle failed: {:#}", e),
        }
    }
}

/// Execute a single cycle: poll relays, evaluate switches, release where due.
pub async fn run_check_cycle(config: &ServerConfig, store: &Mutex<SwitchStore>) -> Result<()> {
    let mut store = store.lock().await;
    if store.is_empty() {
        log::info!("No switches tracked — nothing to do.");
        return Ok(());
    }

    let clock = SystemClock;

    // The pool identity only signs release events; plain evaluation uses
    // a throwaway key.
    let keys = match config.guardian {
        Some(ref guardian) => vigil_core::keys::parse_keys(&guardian.secret_key)
            .map_err(|e| anyhow::anyhow!("guardian key: {}", e))?,
        None => vigil_core::keys::generate(),
    };

    let pool = RelayPool::connect(keys.clone(), config.relays.urls.clone())
        .await
        .context("Failed to connect relay pool")?;

    let mut guardian = config
        .guardian
        .as_ref()
        .map(|g| GuardianNode::with_grace(keys.clone(), g.grace_secs));

    for switch in store.iter_mut() {
        if let Err(e) = evaluate_switch(switch, &pool, &clock, guardian.as_mut()).await {
            log::error!("switch {}: cycle failed: {:#}", switch.id, e);
        }
    }

    store.save().context("Failed to persist switch store")?;
    pool.disconnect().await;

    Ok(())
}

async fn evaluate_switch(
    switch: &mut vigil_switch::Switch,
    pool: &RelayPool,
    clock: &SystemClock,
    guardian: Option<&mut GuardianNode>,
) -> Result<()> {
    if switch.status.is_terminal() {
        return Ok(());
    }

    let now = clock.now();

    // An owner-signed cancel marker retires the switch wherever we see it
    if observe_cancel(switch, pool).await? {
        if switch.cancel().is_ok() {
            log::info!("switch {}: cancelled by owner marker", switch.id);
        }
        return Ok(());
    }

    let observed = observe_latest_checkin(switch, pool).await?;
    let status = switch.evaluate(observed, now);

    let advisory = evaluate_advisory(switch, now);
    match advisory.advisory {
        Advisory::Healthy => {
            log::debug!(
                "switch {}: {:?}, {:.0}% of interval elapsed",
                switch.id,
                status,
                advisory.elapsed_fraction * 100.0
            );
        }
        Advisory::CheckinRecommended => {
            log::info!("switch {}: check-in recommended", switch.id);
        }
        Advisory::CheckinRequired => {
            log::warn!("switch {}: check-in required soon", switch.id);
        }
        Advisory::Overdue => {
            log::warn!("switch {}: overdue — guardians may release", switch.id);
        }
    }

    if status != SwitchStatus::Triggered {
        return Ok(());
    }

    let Some(guardian) = guardian else {
        return Ok(());
    };
    if !switch
        .guardians
        .iter()
        .any(|g| g.pubkey == guardian.public_key())
    {
        return Ok(());
    }

    match guardian.run_cycle(switch, pool, clock, &NoHook).await {
        Ok(outcome) => log::info!("switch {}: guardian cycle: {:?}", switch.id, outcome),
        Err(e) => log::error!("switch {}: guardian cycle failed: {}", switch.id, e),
    }

    // Track how many guardians have released so the switch can retire
    let released = count_released_guardians(switch, pool).await?;
    if let Ok(status) = switch.note_releases(released) {
        if status == SwitchStatus::Released {
            log::info!(
                "switch {}: released ({} guardians published)",
                switch.id,
                released
            );
        }
    }

    Ok(())
}

/// Count distinct share indices with at least one release event.
async fn count_released_guardians(
    switch: &vigil_switch::Switch,
    pool: &RelayPool,
) -> Result<usize> {
    use vigil_relay::events::{share_identifier, EventFilter, KIND_SHARE_RELEASE};

    let switch_id = switch.id.to_string();
    let mut released = 0;
    for guardian in &switch.guardians {
        let filter = EventFilter::new()
            .kind(KIND_SHARE_RELEASE)
            .author(guardian.pubkey)
            .identifier(share_identifier(&switch_id, guardian.index))
            .limit(1);
        if !pool.query(filter).await?.is_empty() {
            released += 1;
        }
    }
    Ok(released)
}
