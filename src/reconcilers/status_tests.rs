// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{BastionStatus, LastError};
    use crate::errors::StatusError;
    use crate::reconcilers::retry::BackoffPolicy;
    use crate::status_reasons::{REASON_ENDPOINTS_READY, REASON_INSTANCE_NOT_RUNNING};
    use k8s_openapi::api::core::v1::LoadBalancerIngress;
    use serde_json::json;
    use std::time::Duration;

    fn instant_backoff() -> BackoffPolicy {
        BackoffPolicy {
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            randomization_factor: 0.0,
            ..BackoffPolicy::default()
        }
    }

    fn key() -> BastionKey {
        BastionKey::new("shoot--dev", "jump")
    }

    fn public_ip(ip: &str) -> LoadBalancerIngress {
        LoadBalancerIngress {
            ip: Some(ip.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_condition() {
        let condition = create_condition("Ready", "True", "EndpointsReady", "ok");

        assert_eq!(condition.r#type, "Ready");
        assert_eq!(condition.status, "True");
        assert_eq!(condition.reason.as_deref(), Some("EndpointsReady"));
        assert_eq!(condition.message.as_deref(), Some("ok"));
        assert!(condition.last_transition_time.is_some());
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut conditions = vec![create_condition("Ready", "False", "Pending", "waiting")];
        conditions[0].last_transition_time = Some("2024-01-01T00:00:00+00:00".to_string());

        update_condition_in_memory(&mut conditions, "Ready", "False", "Other", "still waiting");

        assert_eq!(conditions.len(), 1);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
        assert_eq!(conditions[0].message.as_deref(), Some("still waiting"));
    }

    #[test]
    fn test_transition_time_changes_on_flip() {
        let mut conditions = vec![create_condition("Ready", "False", "Pending", "waiting")];
        conditions[0].last_transition_time = Some("2024-01-01T00:00:00+00:00".to_string());

        update_condition_in_memory(&mut conditions, "Ready", "True", "EndpointsReady", "up");

        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
        assert_eq!(conditions[0].status, "True");
    }

    #[test]
    fn test_publish_ingress_clears_error_and_sets_ready() {
        let mut status = BastionStatus::default();
        record_error(&mut status, REASON_INSTANCE_NOT_RUNNING, "instance stopped");
        assert!(status.last_error.is_some());

        publish_ingress(&mut status, &public_ip("34.1.2.3"), REASON_ENDPOINTS_READY);

        assert!(status.last_error.is_none());
        assert_eq!(status.ingress, Some(public_ip("34.1.2.3")));
        let ready = find_condition(&status.conditions, "Ready").unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.message.as_deref(), Some("Bastion reachable at 34.1.2.3"));
    }

    #[test]
    fn test_record_error_sets_not_ready() {
        let mut status = BastionStatus::default();
        record_error(&mut status, REASON_INSTANCE_NOT_RUNNING, "instance stopped");

        let error = status.last_error.unwrap();
        assert_eq!(error.description, "instance stopped");
        assert_eq!(error.reason.as_deref(), Some(REASON_INSTANCE_NOT_RUNNING));
        let ready = find_condition(&status.conditions, "Ready").unwrap();
        assert_eq!(ready.status, "False");
    }

    #[test]
    fn test_repeated_error_is_a_noop() {
        let mut status = BastionStatus::default();
        record_error(&mut status, REASON_INSTANCE_NOT_RUNNING, "instance stopped");
        let first = status.clone();

        record_error(&mut status, REASON_INSTANCE_NOT_RUNNING, "instance stopped");

        assert_eq!(status, first);
    }

    #[test]
    fn test_merge_patch_nulls_removed_fields() {
        let old = BastionStatus {
            last_error: Some(LastError {
                description: "boom".into(),
                reason: None,
                last_update_time: "2024-01-01T00:00:00Z".into(),
            }),
            ..Default::default()
        };
        let mut new = old.clone();
        new.last_error = None;
        record_zone(&mut new, "europe-west1-b");

        let patch = status_merge_patch(&old, &new).unwrap();

        assert_eq!(patch["lastError"], serde_json::Value::Null);
        assert_eq!(patch["providerStatus"], json!({"zone": "europe-west1-b"}));
    }

    #[test]
    fn test_exhausted_conflict_becomes_retries_exhausted() {
        use crate::reconcilers::retry::Retryable;

        let err = StatusError::Conflict { key: "a/b".into() }.exhausted(4);
        assert!(matches!(
            err,
            StatusError::RetriesExhausted { attempts: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_in_memory_update_applies_mutation() {
        let store = InMemoryStatusStore::new();
        store.insert(&key());

        store
            .try_update_status(&key(), &instant_backoff(), &|s: &mut BastionStatus| {
                record_zone(s, "europe-west1-b");
            })
            .await
            .unwrap();

        let status = store.status(&key()).unwrap();
        assert_eq!(status.provider_status.unwrap().zone, "europe-west1-b");
        assert_eq!(store.resource_version(&key()), Some(1));
    }

    #[tokio::test]
    async fn test_in_memory_noop_write_keeps_version() {
        let store = InMemoryStatusStore::new();
        store.insert(&key());
        let mutate = |s: &mut BastionStatus| record_zone(s, "europe-west1-b");

        store
            .try_update_status(&key(), &instant_backoff(), &mutate)
            .await
            .unwrap();
        store
            .try_update_status(&key(), &instant_backoff(), &mutate)
            .await
            .unwrap();

        assert_eq!(store.resource_version(&key()), Some(1));
    }

    #[tokio::test]
    async fn test_conflict_rereads_and_keeps_concurrent_write() {
        let store = InMemoryStatusStore::new();
        store.insert(&key());
        store.inject_concurrent_writes(2, |s: &mut BastionStatus| {
            s.observed_generation = Some(7);
        });

        store
            .try_update_status(&key(), &instant_backoff(), &|s: &mut BastionStatus| {
                s.ingress = Some(public_ip("34.1.2.3"));
            })
            .await
            .unwrap();

        let status = store.status(&key()).unwrap();
        assert_eq!(status.observed_generation, Some(7));
        assert_eq!(status.ingress, Some(public_ip("34.1.2.3")));
        assert_eq!(store.attempts(), 3);
    }

    #[tokio::test]
    async fn test_conflicts_beyond_budget_are_surfaced() {
        let store = InMemoryStatusStore::new();
        store.insert(&key());
        store.inject_conflicts(10);

        let err = store
            .try_update_status(&key(), &instant_backoff(), &|s: &mut BastionStatus| {
                record_zone(s, "z");
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StatusError::RetriesExhausted { attempts: 4, .. }
        ));
        assert_eq!(store.attempts(), 4);
    }

    #[tokio::test]
    async fn test_missing_bastion_is_not_retried() {
        let store = InMemoryStatusStore::new();

        let err = store
            .try_update_status(&key(), &instant_backoff(), &|s: &mut BastionStatus| {
                record_zone(s, "z");
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StatusError::NotFound { .. }));
        assert_eq!(store.attempts(), 1);
    }
}
