use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use governor::{
    clock::DefaultClock, middleware::StateInformationMiddleware,
    state::keyed::DefaultKeyedStateStore, DefaultKeyedRateLimiter, Quota, RateLimiter,
};

use crate::core::config::RateLimitSettings;

type FailureLimiter =
    RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock, StateInformationMiddleware>;

/// Per-client request budgets. A disabled set admits everything.
#[derive(Clone)]
pub(crate) struct RateLimiters {
    api: Option<Arc<DefaultKeyedRateLimiter<IpAddr>>>,
    auth: Option<Arc<FailureBudget>>,
}

impl RateLimiters {
    pub(crate) fn from_settings(settings: &RateLimitSettings) -> Self {
        if !settings.enabled {
            return Self::disabled();
        }

        Self {
            api: quota(settings.window, settings.max_requests)
                .map(|quota| Arc::new(RateLimiter::keyed(quota))),
            auth: FailureBudget::new(settings.window, settings.auth_max_requests).map(Arc::new),
        }
    }

    pub(crate) fn disabled() -> Self {
        Self { api: None, auth: None }
    }

    /// Draws one request from the client's API budget.
    pub(crate) fn check_api(&self, client: IpAddr) -> bool {
        self.api.as_ref().map_or(true, |limiter| limiter.check_key(&client).is_ok())
    }

    /// Whether the client may attempt an auth request. Does not draw from
    /// the budget.
    pub(crate) fn admits_auth(&self, client: IpAddr) -> bool {
        self.auth.as_ref().map_or(true, |budget| budget.admits(client))
    }

    /// Charges a failed auth request; successful ones are free.
    pub(crate) fn charge_auth_failure(&self, client: IpAddr) {
        if let Some(budget) = &self.auth {
            budget.charge(client);
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.api.is_some() || self.auth.is_some()
    }

    fn retain_recent(&self) {
        if let Some(limiter) = &self.api {
            limiter.retain_recent();
        }
        if let Some(budget) = &self.auth {
            budget.retain_recent();
        }
    }
}

/// Failed-attempt budget. Failures draw cells; once a client's last cell is
/// gone it is locked out until one cell refills.
struct FailureBudget {
    limiter: FailureLimiter,
    refill: Duration,
    locked_until: Mutex<HashMap<IpAddr, Instant>>,
}

impl FailureBudget {
    fn new(window: Duration, max: u32) -> Option<Self> {
        let quota = quota(window, max)?;
        Some(Self {
            limiter: RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
            refill: quota.replenish_interval(),
            locked_until: Mutex::new(HashMap::new()),
        })
    }

    fn admits(&self, client: IpAddr) -> bool {
        let locked = self.locked_until.lock().unwrap_or_else(PoisonError::into_inner);
        locked.get(&client).map_or(true, |until| *until <= Instant::now())
    }

    fn charge(&self, client: IpAddr) {
        let exhausted = match self.limiter.check_key(&client) {
            Ok(snapshot) => snapshot.remaining_burst_capacity() == 0,
            Err(_) => true,
        };
        if exhausted {
            self.locked_until
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(client, Instant::now() + self.refill);
        }
    }

    fn retain_recent(&self) {
        self.limiter.retain_recent();
        let now = Instant::now();
        self.locked_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, until| *until > now);
    }
}

/// `max` requests per `window`, refilled evenly, with the full window
/// available as a burst.
fn quota(window: Duration, max: u32) -> Option<Quota> {
    let burst = NonZeroU32::new(max)?;
    let period = window.checked_div(max)?;
    Some(Quota::with_period(period)?.allow_burst(burst))
}

pub(crate) fn spawn_cleanup(limiters: RateLimiters, every: Duration) {
    if !limiters.is_enabled() || every.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiters.retain_recent();
            tracing::debug!("Pruned idle rate limit keys");
        }
    });
}
