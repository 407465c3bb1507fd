//! Server configuration.
//!
//! コマンドライン引数（`BLEACHERS_*` 環境変数でも指定可）を読み込み、
//! 構成ルートが使う型付きの [`ServerConfig`] に変換します。

use std::{path::PathBuf, time::Duration};

use bleachers_shared::time::{DEFAULT_ZONE_OFFSET_HOURS, zone_offset};
use chrono::FixedOffset;
use clap::Parser;
use thiserror::Error;
use uuid::Uuid;

use crate::{infrastructure::traffic::TrafficSpikeConfig, usecase::AdmissionSettings};

#[derive(Parser, Debug, Clone)]
#[command(name = "bleachers-server")]
#[command(about = "Distributed real-time game chat server", long_about = None)]
pub struct CliArgs {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "BLEACHERS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "BLEACHERS_PORT", default_value = "8080")]
    pub port: u16,

    /// Name of this instance in logs and health checks (random when unset)
    #[arg(long, env = "BLEACHERS_INSTANCE_ID")]
    pub instance_id: Option<String>,

    /// Timezone in which game days are counted, in hours east of UTC
    #[arg(
        long,
        env = "BLEACHERS_ZONE_OFFSET_HOURS",
        default_value_t = DEFAULT_ZONE_OFFSET_HOURS,
        allow_negative_numbers = true
    )]
    pub zone_offset_hours: i32,

    /// How long an admission call waits for the authorization result
    #[arg(long, env = "BLEACHERS_AUTH_TIMEOUT_MS", default_value_t = 5000)]
    pub auth_timeout_ms: u64,

    #[arg(long, env = "BLEACHERS_AUTH_POLL_INTERVAL_MS", default_value_t = 100)]
    pub auth_poll_interval_ms: u64,

    /// Lifetime of an unclaimed authorization result
    #[arg(long, env = "BLEACHERS_AUTH_RESULT_TTL_SECS", default_value_t = 600)]
    pub auth_result_ttl_secs: u64,

    #[arg(long, env = "BLEACHERS_TICKET_TTL_SECS", default_value_t = 300)]
    pub ticket_ttl_secs: u64,

    /// Messages per window that count as a traffic spike
    #[arg(long, env = "BLEACHERS_SPIKE_THRESHOLD", default_value_t = 100)]
    pub spike_threshold: i64,

    #[arg(long, env = "BLEACHERS_SPIKE_WINDOW_MINUTES", default_value_t = 1)]
    pub spike_window_minutes: u32,

    #[arg(long, env = "BLEACHERS_SPIKE_COOLDOWN_SECS", default_value_t = 300)]
    pub spike_cooldown_secs: u64,

    #[arg(long, env = "BLEACHERS_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// How long an empty match room survives
    #[arg(long, env = "BLEACHERS_EMPTY_ROOM_GRACE_SECS", default_value_t = 600)]
    pub empty_room_grace_secs: u64,

    /// Capacity of every watch room
    #[arg(long, env = "BLEACHERS_WATCH_CAPACITY", default_value_t = 1000)]
    pub watch_capacity: u32,

    #[arg(long, env = "BLEACHERS_ROOM_TTL_SECS", default_value_t = 86_400)]
    pub room_ttl_secs: u64,

    #[arg(long, env = "BLEACHERS_GAME_TTL_SECS", default_value_t = 172_800)]
    pub game_ttl_secs: u64,

    /// Answer authorization requests in-process from this token → profile file
    #[arg(long, env = "BLEACHERS_STUB_PROFILES")]
    pub stub_profiles: Option<PathBuf>,

    /// Games to load at startup (JSON array of game-schedule records)
    #[arg(long, env = "BLEACHERS_SEED_GAMES")]
    pub seed_games: Option<PathBuf>,

    /// Redis URL for the shared store, broker and queue (in-memory when unset)
    #[cfg(feature = "redis-backend")]
    #[arg(long, env = "BLEACHERS_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, env = "BLEACHERS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("zone offset must be between -23 and 23 hours, got {0}")]
    ZoneOffset(i32),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Typed configuration of one instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub instance_id: String,
    pub zone: FixedOffset,
    pub auth_timeout: Duration,
    pub auth_poll_interval: Duration,
    pub auth_result_ttl: Duration,
    pub ticket_ttl: Duration,
    pub spike: TrafficSpikeConfig,
    pub sweep_interval: Duration,
    pub empty_room_grace: Duration,
    pub watch_capacity: u32,
    pub room_ttl: Duration,
    pub game_ttl: Duration,
    pub stub_profiles: Option<PathBuf>,
    pub seed_games: Option<PathBuf>,
    #[cfg(feature = "redis-backend")]
    pub redis_url: Option<String>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn admission_settings(&self) -> AdmissionSettings {
        AdmissionSettings {
            auth_timeout: self.auth_timeout,
            ticket_ttl: self.ticket_ttl,
            watch_capacity: self.watch_capacity,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            instance_id: generate_instance_id(),
            zone: zone_offset(DEFAULT_ZONE_OFFSET_HOURS),
            auth_timeout: Duration::from_millis(5000),
            auth_poll_interval: Duration::from_millis(100),
            auth_result_ttl: Duration::from_secs(600),
            ticket_ttl: Duration::from_secs(300),
            spike: TrafficSpikeConfig::default(),
            sweep_interval: Duration::from_secs(60),
            empty_room_grace: Duration::from_secs(600),
            watch_capacity: 1000,
            room_ttl: Duration::from_secs(86_400),
            game_ttl: Duration::from_secs(172_800),
            stub_profiles: None,
            seed_games: None,
            #[cfg(feature = "redis-backend")]
            redis_url: None,
        }
    }
}

fn generate_instance_id() -> String {
    format!("chat-{}", &Uuid::new_v4().simple().to_string()[..8])
}

fn non_zero(value: u64, name: &'static str) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero(name));
    }
    Ok(value)
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !(-23..=23).contains(&args.zone_offset_hours) {
            return Err(ConfigError::ZoneOffset(args.zone_offset_hours));
        }
        if args.watch_capacity == 0 {
            return Err(ConfigError::Zero("watch capacity"));
        }
        if args.spike_threshold <= 0 {
            return Err(ConfigError::Zero("spike threshold"));
        }
        if args.spike_window_minutes == 0 {
            return Err(ConfigError::Zero("spike window"));
        }

        Ok(Self {
            host: args.host,
            port: args.port,
            instance_id: args
                .instance_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(generate_instance_id),
            zone: zone_offset(args.zone_offset_hours),
            auth_timeout: Duration::from_millis(non_zero(args.auth_timeout_ms, "auth timeout")?),
            auth_poll_interval: Duration::from_millis(non_zero(
                args.auth_poll_interval_ms,
                "auth poll interval",
            )?),
            auth_result_ttl: Duration::from_secs(non_zero(
                args.auth_result_ttl_secs,
                "auth result ttl",
            )?),
            ticket_ttl: Duration::from_secs(non_zero(args.ticket_ttl_secs, "ticket ttl")?),
            spike: TrafficSpikeConfig {
                threshold: args.spike_threshold,
                window_minutes: args.spike_window_minutes,
                cooldown: Duration::from_secs(args.spike_cooldown_secs),
            },
            sweep_interval: Duration::from_secs(non_zero(
                args.sweep_interval_secs,
                "sweep interval",
            )?),
            empty_room_grace: Duration::from_secs(args.empty_room_grace_secs),
            watch_capacity: args.watch_capacity,
            room_ttl: Duration::from_secs(non_zero(args.room_ttl_secs, "room ttl")?),
            game_ttl: Duration::from_secs(non_zero(args.game_ttl_secs, "game ttl")?),
            stub_profiles: args.stub_profiles,
            seed_games: args.seed_games,
            #[cfg(feature = "redis-backend")]
            redis_url: args.redis_url,
        })
    }
}
