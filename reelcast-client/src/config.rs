//! Typed configuration surfaces. No
//! global mutable config singleton: every component takes its config by
//! value at construction, and tests override timeouts directly instead of
//! poking a shared table.

use std::time::Duration;

/// Coarse signal for picking network-class defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkClass {
    Cellular,
    Wifi,
    /// Short timeouts, small windows — for deterministic tests.
    Testing,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_controllers: usize,
    pub max_videos: usize,
    pub preload_timeout: Duration,
    pub max_retries: u32,
    pub grace_period: Duration,
}

impl PoolConfig {
    pub fn for_network(class: NetworkClass) -> Self {
        match class {
            NetworkClass::Cellular => Self {
                max_controllers: 15,
                max_videos: 50,
                preload_timeout: Duration::from_secs(15),
                max_retries: 2,
                grace_period: Duration::from_secs(20),
            },
            NetworkClass::Wifi => Self {
                max_controllers: 15,
                max_videos: 100,
                preload_timeout: Duration::from_secs(15),
                max_retries: 2,
                grace_period: Duration::from_secs(20),
            },
            NetworkClass::Testing => Self {
                max_controllers: 15,
                max_videos: 100,
                preload_timeout: Duration::from_millis(500),
                max_retries: 2,
                grace_period: Duration::from_millis(50),
            },
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::for_network(NetworkClass::Wifi)
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub seen_ids_capacity: usize,
    pub max_event_age: Duration,
    pub health_check_silence_threshold: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            seen_ids_capacity: 1_000,
            max_event_age: Duration::from_secs(30 * 24 * 60 * 60),
            health_check_silence_threshold: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileFetcherConfig {
    pub debounce: Duration,
    pub fallback_timeout: Duration,
    pub negative_cache_ttl: Duration,
    pub hard_ttl: Duration,
    pub soft_ttl: Duration,
    pub background_refresh_min_interval: Duration,
    pub max_batch_size: usize,
}

impl Default for ProfileFetcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(75),
            fallback_timeout: Duration::from_secs(30),
            negative_cache_ttl: Duration::from_secs(10 * 60),
            hard_ttl: Duration::from_secs(365 * 24 * 60 * 60),
            soft_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            background_refresh_min_interval: Duration::from_secs(30),
            max_batch_size: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub authorization_ttl: Duration,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    pub broadcast_timeout: Duration,
    pub thumbnail_extract_timeout: Duration,
    pub thumbnail_hash_timeout: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            authorization_ttl: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(60),
            broadcast_timeout: Duration::from_secs(5),
            thumbnail_extract_timeout: Duration::from_secs(10),
            thumbnail_hash_timeout: Duration::from_secs(3),
        }
    }
}
