use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};

use super::config::ConnectionConfig;
use super::guard::ConnectionGuard;
use crate::errors::ConnectionError;

/// How many of the most recent request durations feed `avg_response_time_ms`.
const RESPONSE_TIME_WINDOW: usize = 100;

#[derive(Debug)]
struct ClientStats {
    active_connections: usize,
    last_active: Instant,
    total_requests: u64,
    error_count: u64,
}

/// Tracks concurrent TCP clients per the limits in [`ConnectionConfig`]: a
/// global semaphore plus one per-IP semaphore, and request/error counters
/// used by the HTTP status surface.
pub struct Manager {
    per_ip_semaphores: Mutex<HashMap<SocketAddr, Arc<Semaphore>>>,
    global_semaphore: Arc<Semaphore>,
    stats: Mutex<HashMap<SocketAddr, ClientStats>>,
    config: ConnectionConfig,
    total_connections: AtomicU64,
    response_times: Mutex<VecDeque<Duration>>,
    start_time: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionStats {
    pub total_connections: u64,
    pub active_connections: usize,
    pub total_requests: u64,
    pub total_errors: u64,
    pub avg_response_time_ms: u64,
    pub requests_per_second: f64,
}

impl Manager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            per_ip_semaphores: Mutex::new(HashMap::new()),
            global_semaphore: Arc::new(Semaphore::new(config.max_connections)),
            stats: Mutex::new(HashMap::new()),
            config,
            total_connections: AtomicU64::new(0),
            response_times: Mutex::new(VecDeque::with_capacity(RESPONSE_TIME_WINDOW)),
            start_time: Instant::now(),
        }
    }

    /// Admits a new client connection, enforcing the global and per-IP
    /// limits. The returned guard releases both permits and decrements the
    /// active count on drop.
    pub async fn accept(self: &Arc<Self>, addr: SocketAddr) -> Result<ConnectionGuard, ConnectionError> {
        let global_permit = Arc::clone(&self.global_semaphore)
            .try_acquire_owned()
            .map_err(|_| ConnectionError::limit_exceeded("global connection limit reached"))?;

        let per_ip_permit = if let Some(limit) = self.config.per_ip_limit {
            let mut semaphores = self.per_ip_semaphores.lock().await;
            let semaphore = semaphores
                .entry(addr)
                .or_insert_with(|| Arc::new(Semaphore::new(limit)))
                .clone();
            Some(semaphore.try_acquire_owned().map_err(|_| {
                ConnectionError::limit_exceeded(format!("per-IP limit ({limit}) reached for {addr}"))
            })?)
        } else {
            None
        };

        {
            let mut stats = self.stats.lock().await;
            let entry = stats.entry(addr).or_insert_with(|| ClientStats {
                active_connections: 0,
                last_active: Instant::now(),
                total_requests: 0,
                error_count: 0,
            });
            entry.active_connections += 1;
            entry.last_active = Instant::now();
        }

        self.total_connections.fetch_add(1, Ordering::Relaxed);

        Ok(ConnectionGuard::new(
            Arc::clone(self),
            addr,
            global_permit,
            per_ip_permit,
        ))
    }

    pub async fn record_request(&self, addr: SocketAddr, success: bool, duration: Duration) {
        {
            let mut stats = self.stats.lock().await;
            if let Some(entry) = stats.get_mut(&addr) {
                entry.total_requests += 1;
                entry.last_active = Instant::now();
                if !success {
                    entry.error_count += 1;
                }
            }
        }

        let mut response_times = self.response_times.lock().await;
        if response_times.len() >= RESPONSE_TIME_WINDOW {
            response_times.pop_front();
        }
        response_times.push_back(duration);
    }

    async fn avg_response_time_ms(&self) -> u64 {
        let response_times = self.response_times.lock().await;
        if response_times.is_empty() {
            return 0;
        }
        let sum: Duration = response_times.iter().sum();
        (sum / response_times.len() as u32).as_millis() as u64
    }

    fn requests_per_second(&self, total_requests: u64) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            total_requests as f64 / elapsed
        } else {
            0.0
        }
    }

    pub async fn on_disconnect(&self, addr: SocketAddr) {
        let mut stats = self.stats.lock().await;
        if let Some(entry) = stats.get_mut(&addr) {
            entry.active_connections = entry.active_connections.saturating_sub(1);
        }
    }

    pub async fn cleanup_idle(&self) {
        let now = Instant::now();
        let mut stats = self.stats.lock().await;
        stats.retain(|_, s| now.duration_since(s.last_active) < self.config.idle_timeout);
    }

    pub async fn get_stats(&self) -> ConnectionStats {
        let (active, requests, errors) = {
            let stats = self.stats.lock().await;
            let mut active = 0;
            let mut requests = 0;
            let mut errors = 0;
            for entry in stats.values() {
                active += entry.active_connections;
                requests += entry.total_requests;
                errors += entry.error_count;
            }
            (active, requests, errors)
        };
        ConnectionStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: active,
            total_requests: requests,
            total_errors: errors,
            avg_response_time_ms: self.avg_response_time_ms().await,
            requests_per_second: self.requests_per_second(requests),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(last_octet: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, last_octet)), 1234)
    }

    #[tokio::test]
    async fn enforces_global_and_per_ip_limits() {
        let config = ConnectionConfig {
            max_connections: 2,
            per_ip_limit: Some(1),
            ..Default::default()
        };
        let manager = Arc::new(Manager::new(config));

        let conn1 = manager.accept(addr(1)).await;
        assert!(conn1.is_ok());

        let conn2 = manager.accept(addr(1)).await;
        assert!(conn2.is_err(), "same IP should hit its per-IP limit");

        let conn3 = manager.accept(addr(2)).await;
        assert!(conn3.is_ok());

        let conn4 = manager.accept(addr(3)).await;
        assert!(conn4.is_err(), "third connection should hit the global limit");
    }

    #[tokio::test]
    async fn records_requests_and_errors_per_client() {
        let manager = Arc::new(Manager::new(ConnectionConfig::default()));
        let _conn = manager.accept(addr(1)).await.unwrap();
        manager.record_request(addr(1), true, Duration::from_millis(10)).await;
        manager.record_request(addr(1), false, Duration::from_millis(20)).await;

        let stats = manager.get_stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.active_connections, 1);
    }

    #[tokio::test]
    async fn tracks_average_response_time_and_request_rate() {
        let manager = Arc::new(Manager::new(ConnectionConfig::default()));
        let _conn = manager.accept(addr(1)).await.unwrap();
        manager.record_request(addr(1), true, Duration::from_millis(10)).await;
        manager.record_request(addr(1), true, Duration::from_millis(30)).await;

        let stats = manager.get_stats().await;
        assert_eq!(stats.avg_response_time_ms, 20);
        assert!(stats.requests_per_second > 0.0);
    }

    #[tokio::test]
    async fn cleanup_idle_drops_stale_clients() {
        let config = ConnectionConfig {
            idle_timeout: std::time::Duration::from_millis(1),
            ..Default::default()
        };
        let manager = Arc::new(Manager::new(config));
        let guard = manager.accept(addr(1)).await.unwrap();
        drop(guard);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        manager.cleanup_idle().await;

        let stats = manager.get_stats().await;
        assert_eq!(stats.active_connections, 0);
    }
}
