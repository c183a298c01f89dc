use crate::api::{with_retries, ApiClient, ApiError, RoomStatus};
use crate::collectors::processes::{current_username, sample_processes, OwnershipFilter};
use crate::config::Config;
use std::time::Duration;
use sysinfo::{System, SystemExt};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    RoomClosed,
    TooManyErrors,
    Cancelled,
}

// Outcome of a room-status poll after retries.
pub enum RoomCheck {
    Gone,
    Status(RoomStatus),
}

// All monitoring state lives on the instance, so independent sessions could
// run side by side.
pub struct Reporter {
    api: ApiClient,
    room_id: String,
    poll_interval: Duration,
    retry_delay: Duration,
    max_retries: u32,
    failure_threshold: u32,
    system: System,
    ownership: OwnershipFilter,
    consecutive_errors: u32,
    last_both_online: bool,
}

impl Reporter {
    pub fn new(cfg: &Config, api: ApiClient, room_id: String) -> Self {
        let mut system = System::new_all();
        system.refresh_users_list();
        let current_user = current_username(&system).unwrap_or_default();
        if current_user.is_empty() {
            warn!("could not resolve the current user; process snapshots will be empty");
        }
        let ownership = OwnershipFilter::for_current_platform(current_user);

        Self {
            api,
            room_id,
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            retry_delay: Duration::from_secs(cfg.retry_delay_secs),
            max_retries: cfg.max_retries,
            failure_threshold: cfg.failure_threshold,
            system,
            ownership,
            consecutive_errors: 0,
            last_both_online: false,
        }
    }

    // Only a 404 means the room is gone; flakiness and server errors degrade
    // to "room exists, both offline".
    pub async fn check_room(&self) -> RoomCheck {
        let result = with_retries(self.max_retries, self.retry_delay, || {
            self.api.room_status(&self.room_id)
        })
        .await;

        match result {
            Ok(status) => RoomCheck::Status(status),
            Err(ApiError::RoomNotFound) => RoomCheck::Gone,
            Err(ApiError::InvalidSessionKey) => {
                warn!("session key rejected; treating both participants as offline");
                RoomCheck::Status(RoomStatus::offline())
            }
            Err(err) => {
                warn!(error = %err, "room status unavailable; treating both participants as offline");
                RoomCheck::Status(RoomStatus::offline())
            }
        }
    }

    pub async fn run(&mut self, stop: watch::Receiver<bool>) -> StopReason {
        let mut tick: u64 = 0;
        loop {
            // Stop flag is read once per tick; in-flight requests finish.
            if *stop.borrow() {
                info!("stop requested, monitoring finished");
                return StopReason::Cancelled;
            }
            tick += 1;
            debug!(tick, "poll tick");

            match self.check_room().await {
                RoomCheck::Gone => {
                    info!("room no longer exists, monitoring finished");
                    return StopReason::RoomClosed;
                }
                RoomCheck::Status(status) => {
                    if self.gate(&status) {
                        let records = sample_processes(&mut self.system, &self.ownership);
                        let result = self.api.send_processes(&self.room_id, &records).await;
                        if result.is_ok() {
                            info!(count = records.len(), "process list sent");
                        }
                        if self.record_send(&result) {
                            error!(
                                threshold = self.failure_threshold,
                                "too many consecutive send errors, monitoring stopped"
                            );
                            return StopReason::TooManyErrors;
                        }
                    }
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    // Both-online transitions are logged once per edge; per-participant
    // detail stays at debug.
    fn gate(&mut self, status: &RoomStatus) -> bool {
        if status.both_online() {
            if !self.last_both_online {
                info!("both interviewer and interviewee are connected");
                self.last_both_online = true;
            }
            return true;
        }

        if self.last_both_online {
            info!("one or both participants went offline");
            self.last_both_online = false;
        }
        if !status.interviewer_connected {
            debug!("interviewer offline");
        }
        if !status.interviewee_connected {
            debug!("interviewee offline");
        }
        false
    }

    // True once the failure threshold is reached.
    fn record_send(&mut self, result: &Result<(), ApiError>) -> bool {
        match result {
            Ok(()) => {
                self.consecutive_errors = 0;
                false
            }
            Err(err) => {
                self.consecutive_errors += 1;
                warn!(
                    error = %err,
                    consecutive_errors = self.consecutive_errors,
                    "failed to send process list"
                );
                self.consecutive_errors >= self.failure_threshold
            }
        }
    }
}
