// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Monitoring parameters, subscription settings and the monitored item
//! state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SubscriptionError, UaResult};
use crate::filter::MonitoringFilter;
use crate::types::MonitoringMode;

/// Default publishing interval in milliseconds.
pub const DEFAULT_PUBLISHING_INTERVAL: f64 = 1000.0;

/// Default sampling interval in milliseconds.
pub const DEFAULT_SAMPLING_INTERVAL: f64 = 250.0;

// =============================================================================
// MonitoringState
// =============================================================================

/// Lifecycle of one monitored item.
///
/// ```text
/// Unmonitored -> Enabling -> Monitored -> Disabling -> Unmonitored
///                    \________________________________/
///                         (failure acknowledgement)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringState {
    /// Not monitored.
    #[default]
    Unmonitored,

    /// Enable requested, acknowledgement pending.
    Enabling,

    /// Monitored; notifications are forwarded.
    Monitored,

    /// Disable requested, acknowledgement pending.
    Disabling,
}

impl MonitoringState {
    /// Returns `true` if notifications are forwarded in this state.
    #[inline]
    pub const fn is_monitored(&self) -> bool {
        matches!(self, Self::Monitored)
    }

    /// Returns `true` while an acknowledgement is outstanding.
    #[inline]
    pub const fn is_transitioning(&self) -> bool {
        matches!(self, Self::Enabling | Self::Disabling)
    }

    /// Returns the state after an acknowledgement with the given outcome.
    pub const fn acknowledge(self, success: bool) -> Self {
        match self {
            Self::Enabling if success => Self::Monitored,
            Self::Enabling | Self::Disabling | Self::Unmonitored => Self::Unmonitored,
            Self::Monitored => Self::Monitored,
        }
    }
}

impl fmt::Display for MonitoringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmonitored => write!(f, "Unmonitored"),
            Self::Enabling => write!(f, "Enabling"),
            Self::Monitored => write!(f, "Monitored"),
            Self::Disabling => write!(f, "Disabling"),
        }
    }
}

// =============================================================================
// SubscriptionType
// =============================================================================

/// Whether an item may share a subscription with other items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    /// Reuse any subscription with the same publishing interval.
    #[default]
    Shared,

    /// Always get a subscription of its own.
    Exclusive,
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Publishing parameters of a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Publishing interval in milliseconds.
    #[serde(default = "default_publishing_interval")]
    pub publishing_interval: f64,

    /// Publishing intervals without a publish request before the
    /// subscription expires.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Max keep-alive count.
    #[serde(default = "default_keepalive_count")]
    pub max_keep_alive_count: u32,

    /// Maximum notifications per publish (0 = unlimited).
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Priority (0-255, higher is more important).
    #[serde(default)]
    pub priority: u8,

    /// Publishing enabled.
    #[serde(default = "default_true")]
    pub publishing_enabled: bool,
}

fn default_publishing_interval() -> f64 {
    DEFAULT_PUBLISHING_INTERVAL
}

fn default_lifetime_count() -> u32 {
    60
}

fn default_keepalive_count() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval: DEFAULT_PUBLISHING_INTERVAL,
            lifetime_count: default_lifetime_count(),
            max_keep_alive_count: default_keepalive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
        }
    }
}

impl SubscriptionSettings {
    /// Creates settings with a custom publishing interval.
    pub fn with_interval(publishing_interval: f64) -> Self {
        Self {
            publishing_interval,
            ..Default::default()
        }
    }

    /// Checks the settings.
    ///
    /// The lifetime count must be at least three keep-alive counts.
    pub fn validate(&self) -> UaResult<()> {
        if !self.publishing_interval.is_finite() || self.publishing_interval <= 0.0 {
            return Err(SubscriptionError::invalid_settings("publishing interval must be positive").into());
        }
        if self.max_keep_alive_count == 0 {
            return Err(SubscriptionError::invalid_settings("max keep-alive count must be positive").into());
        }
        if self.lifetime_count < self.max_keep_alive_count.saturating_mul(3) {
            return Err(SubscriptionError::invalid_settings(format!(
                "lifetime count {} is less than three keep-alive counts ({})",
                self.lifetime_count, self.max_keep_alive_count
            ))
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// MonitoringParameters
// =============================================================================

/// Parameters for enabling monitoring on a node.
///
/// Item-level fields (sampling interval, queue, filter, mode) configure
/// the monitored item. Subscription-level fields select or create the
/// subscription the item joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringParameters {
    /// Sampling interval in milliseconds; negative means the publishing
    /// interval.
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval: f64,

    /// Server-side queue size.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Discard the oldest entry when the queue overflows.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,

    /// Item filter.
    #[serde(default)]
    pub filter: MonitoringFilter,

    /// Requested publishing interval in milliseconds.
    #[serde(default = "default_publishing_interval")]
    pub publishing_interval: f64,

    /// Join this subscription instead of selecting one by interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<u32>,

    /// Shared or exclusive subscription.
    #[serde(default)]
    pub subscription_type: SubscriptionType,

    /// Monitoring mode.
    #[serde(default)]
    pub monitoring_mode: MonitoringMode,

    /// Lifetime count for a newly created subscription.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Max keep-alive count for a newly created subscription.
    #[serde(default = "default_keepalive_count")]
    pub max_keep_alive_count: u32,

    /// Max notifications per publish for a newly created subscription.
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Priority for a newly created subscription.
    #[serde(default)]
    pub priority: u8,

    /// Publishing enabled for a newly created subscription.
    #[serde(default = "default_true")]
    pub publishing_enabled: bool,

    /// Index range of the monitored value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,

    /// Server-assigned monitored item id, filled in by acknowledgements.
    #[serde(default)]
    pub monitored_item_id: u32,
}

fn default_sampling_interval() -> f64 {
    DEFAULT_SAMPLING_INTERVAL
}

fn default_queue_size() -> u32 {
    1
}

impl Default for MonitoringParameters {
    fn default() -> Self {
        Self {
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            queue_size: default_queue_size(),
            discard_oldest: true,
            filter: MonitoringFilter::None,
            publishing_interval: DEFAULT_PUBLISHING_INTERVAL,
            subscription_id: None,
            subscription_type: SubscriptionType::Shared,
            monitoring_mode: MonitoringMode::Reporting,
            lifetime_count: default_lifetime_count(),
            max_keep_alive_count: default_keepalive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
            index_range: None,
            monitored_item_id: 0,
        }
    }
}

impl MonitoringParameters {
    /// Parameters with the given publishing and sampling intervals.
    pub fn with_intervals(publishing_interval: f64, sampling_interval: f64) -> Self {
        Self {
            publishing_interval,
            sampling_interval,
            ..Default::default()
        }
    }

    /// Sets the filter.
    pub fn with_filter(mut self, filter: MonitoringFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Requests a subscription of its own.
    pub fn exclusive(mut self) -> Self {
        self.subscription_type = SubscriptionType::Exclusive;
        self
    }

    /// Joins an existing subscription.
    pub fn in_subscription(mut self, subscription_id: u32) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    /// Subscription settings derived from these parameters.
    pub fn subscription_settings(&self) -> SubscriptionSettings {
        SubscriptionSettings {
            publishing_interval: self.publishing_interval,
            lifetime_count: self.lifetime_count,
            max_keep_alive_count: self.max_keep_alive_count,
            max_notifications_per_publish: self.max_notifications_per_publish,
            priority: self.priority,
            publishing_enabled: self.publishing_enabled,
        }
    }

    /// Validates item-level fields and the filter.
    pub fn validate(&self) -> UaResult<()> {
        if self.sampling_interval.is_nan() {
            return Err(SubscriptionError::invalid_settings("sampling interval is not a number").into());
        }
        self.filter.validate()?;
        if self.subscription_id.is_none() {
            self.subscription_settings().validate()?;
        }
        Ok(())
    }
}

// =============================================================================
// MonitoringParameterChange
// =============================================================================

/// One parameter of a live monitored item or its subscription to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "parameter", content = "value", rename_all = "snake_case")]
pub enum MonitoringParameterChange {
    /// Subscription publishing interval.
    PublishingInterval(f64),
    /// Subscription lifetime count.
    LifetimeCount(u32),
    /// Subscription max keep-alive count.
    MaxKeepAliveCount(u32),
    /// Subscription max notifications per publish.
    MaxNotificationsPerPublish(u32),
    /// Subscription priority.
    Priority(u8),
    /// Item sampling interval.
    SamplingInterval(f64),
    /// Item queue size.
    QueueSize(u32),
    /// Item discard policy.
    DiscardOldest(bool),
    /// Item filter.
    Filter(MonitoringFilter),
    /// Item monitoring mode.
    MonitoringMode(MonitoringMode),
}

impl MonitoringParameterChange {
    /// Returns `true` if the change applies to the whole subscription.
    pub const fn is_subscription_level(&self) -> bool {
        matches!(
            self,
            Self::PublishingInterval(_)
                | Self::LifetimeCount(_)
                | Self::MaxKeepAliveCount(_)
                | Self::MaxNotificationsPerPublish(_)
                | Self::Priority(_)
        )
    }

    /// Returns the parameter name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PublishingInterval(_) => "publishing_interval",
            Self::LifetimeCount(_) => "lifetime_count",
            Self::MaxKeepAliveCount(_) => "max_keep_alive_count",
            Self::MaxNotificationsPerPublish(_) => "max_notifications_per_publish",
            Self::Priority(_) => "priority",
            Self::SamplingInterval(_) => "sampling_interval",
            Self::QueueSize(_) => "queue_size",
            Self::DiscardOldest(_) => "discard_oldest",
            Self::Filter(_) => "filter",
            Self::MonitoringMode(_) => "monitoring_mode",
        }
    }

    /// Writes the change into a parameter set.
    pub fn apply_to(&self, parameters: &mut MonitoringParameters) {
        match self {
            Self::PublishingInterval(v) => parameters.publishing_interval = *v,
            Self::LifetimeCount(v) => parameters.lifetime_count = *v,
            Self::MaxKeepAliveCount(v) => parameters.max_keep_alive_count = *v,
            Self::MaxNotificationsPerPublish(v) => parameters.max_notifications_per_publish = *v,
            Self::Priority(v) => parameters.priority = *v,
            Self::SamplingInterval(v) => parameters.sampling_interval = *v,
            Self::QueueSize(v) => parameters.queue_size = *v,
            Self::DiscardOldest(v) => parameters.discard_oldest = *v,
            Self::Filter(v) => parameters.filter = v.clone(),
            Self::MonitoringMode(v) => parameters.monitoring_mode = *v,
        }
    }

    /// Writes a subscription-level change into subscription settings.
    pub fn apply_to_settings(&self, settings: &mut SubscriptionSettings) {
        match self {
            Self::PublishingInterval(v) => settings.publishing_interval = *v,
            Self::LifetimeCount(v) => settings.lifetime_count = *v,
            Self::MaxKeepAliveCount(v) => settings.max_keep_alive_count = *v,
            Self::MaxNotificationsPerPublish(v) => settings.max_notifications_per_publish = *v,
            Self::Priority(v) => settings.priority = *v,
            _ => {}
        }
    }
}

impl fmt::Display for MonitoringParameterChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DataChangeFilter;

    #[test]
    fn test_state_transitions() {
        assert_eq!(MonitoringState::Enabling.acknowledge(true), MonitoringState::Monitored);
        assert_eq!(MonitoringState::Enabling.acknowledge(false), MonitoringState::Unmonitored);
        assert_eq!(MonitoringState::Disabling.acknowledge(true), MonitoringState::Unmonitored);
        assert_eq!(MonitoringState::Disabling.acknowledge(false), MonitoringState::Unmonitored);
        assert!(MonitoringState::Monitored.is_monitored());
        assert!(MonitoringState::Disabling.is_transitioning());
    }

    #[test]
    fn test_settings_validation() {
        assert!(SubscriptionSettings::default().validate().is_ok());
        assert!(SubscriptionSettings::with_interval(0.0).validate().is_err());

        let mut settings = SubscriptionSettings::default();
        settings.lifetime_count = 20;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parameter_change() {
        let mut params = MonitoringParameters::default();
        let change = MonitoringParameterChange::Filter(MonitoringFilter::DataChange(DataChangeFilter::absolute(0.5)));
        assert!(!change.is_subscription_level());
        change.apply_to(&mut params);
        assert!(params.filter.as_data_change().is_some());

        let interval = MonitoringParameterChange::PublishingInterval(250.0);
        assert!(interval.is_subscription_level());
        let mut settings = params.subscription_settings();
        interval.apply_to_settings(&mut settings);
        assert_eq!(settings.publishing_interval, 250.0);
    }

    #[test]
    fn test_parameters_deserialize_defaults() {
        let params: MonitoringParameters = serde_json::from_str(r#"{"publishing_interval": 500.0}"#).unwrap();
        assert_eq!(params.publishing_interval, 500.0);
        assert_eq!(params.queue_size, 1);
        assert_eq!(params.subscription_type, SubscriptionType::Shared);
        assert!(params.validate().is_ok());
    }
}
