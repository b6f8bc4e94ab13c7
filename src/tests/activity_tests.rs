//! tests/activity_tests.rs
//! Pruebas de `ActivityService`: programar, completar y el aviso al propietario.

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveTime};

    use crate::error::ServiceError;
    use crate::models::activity_model::{
        ActivityKind, ActivityOutcome, ActivityStatus, CompleteActivityRequest, InterestLevel,
        ScheduleActivityRequest, TaskSubtype,
    };
    use crate::models::notification_model::NotificationKind;
    use crate::tests::support::{start_time, test_env, OWNER};

    fn activity(deal_id: &str, kind: ActivityKind, assignee: &str) -> ScheduleActivityRequest {
        ScheduleActivityRequest {
            deal_id: deal_id.to_string(),
            kind,
            task_subtype: (kind == ActivityKind::Task).then_some(TaskSubtype::Correo),
            assignee_id: assignee.to_string(),
            title: Some(format!("{} de prueba", kind.label())),
            due_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 30, 0),
            duration_minutes: None,
        }
    }

    fn outcome_by(user: &str) -> CompleteActivityRequest {
        CompleteActivityRequest {
            completed_by: user.to_string(),
            outcome: ActivityOutcome {
                response: Some(true),
                interest_level: Some(InterestLevel::Alto),
                info_sent: Some(false),
                next_action: Some("Enviar cotización".to_string()),
            },
            note: Some("Muy interesado".to_string()),
        }
    }

    #[actix_rt::test]
    async fn schedule_computes_due_instant_and_starts_open() {
        let env = test_env().await;
        let deal = env.create_deal("Agenda").await;

        let meeting = env
            .services
            .activity_service
            .schedule(activity(&deal.id, ActivityKind::Meeting, OWNER))
            .await
            .unwrap();
        assert_eq!(meeting.status, ActivityStatus::Open);
        assert_eq!(meeting.due_at.to_rfc3339(), "2024-05-02T10:30:00+00:00");
        assert!(meeting.outcome.is_none());
    }

    #[actix_rt::test]
    async fn schedule_on_missing_deal_is_not_found() {
        let env = test_env().await;
        let err = env
            .services
            .activity_service
            .schedule(activity("no-existe", ActivityKind::Call, OWNER))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(env.count("SELECT COUNT(*) FROM actividades").await, 0);
    }

    #[actix_rt::test]
    async fn completing_any_kind_stamps_the_deal() {
        let env = test_env().await;

        for (hours, kind) in [
            (1, ActivityKind::Task),
            (2, ActivityKind::Call),
            (3, ActivityKind::Meeting),
        ] {
            let deal = env.create_deal(&format!("Trato {kind}")).await;
            let act = env
                .services
                .activity_service
                .schedule(activity(&deal.id, kind, OWNER))
                .await
                .unwrap();

            env.clock.set(start_time() + Duration::hours(hours));
            let done = env
                .services
                .activity_service
                .complete(&act.id, outcome_by(OWNER))
                .await
                .unwrap();
            assert_eq!(done.status, ActivityStatus::Closed);
            assert_eq!(done.completed_at, Some(env.clock_now()));
            assert_eq!(
                done.outcome.as_ref().and_then(|o| o.interest_level),
                Some(InterestLevel::Alto)
            );

            let after = env.services.deal_service.get_deal(&deal.id).await.unwrap();
            assert_eq!(after.last_activity_at, done.completed_at, "kind {kind}");
        }
    }

    #[actix_rt::test]
    async fn completing_twice_reports_already_closed() {
        let env = test_env().await;
        let deal = env.create_deal("Doble cierre").await;
        let svc = &env.services.activity_service;
        let act = svc
            .schedule(activity(&deal.id, ActivityKind::Call, OWNER))
            .await
            .unwrap();

        let first = svc.complete(&act.id, outcome_by(OWNER)).await.unwrap();
        env.clock.advance(Duration::hours(1));
        let err = svc.complete(&act.id, outcome_by(OWNER)).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyClosed(_)));

        // El primer cierre queda como estaba
        let stored = svc.get_activity(&act.id).await.unwrap();
        assert_eq!(stored.completed_at, first.completed_at);

        let err = svc.complete("no-existe", outcome_by(OWNER)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn malformed_outcome_is_rejected_before_closing() {
        let env = test_env().await;
        let deal = env.create_deal("Mal formado").await;
        let svc = &env.services.activity_service;
        let act = svc
            .schedule(activity(&deal.id, ActivityKind::Call, OWNER))
            .await
            .unwrap();

        let mut req = outcome_by(OWNER);
        req.outcome.next_action = Some("   ".to_string());
        let err = svc.complete(&act.id, req).await.unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(
            svc.get_activity(&act.id).await.unwrap().status,
            ActivityStatus::Open
        );
    }

    #[actix_rt::test]
    async fn owner_is_notified_when_someone_else_completes() {
        let env = test_env().await;
        let deal = env.create_deal("Delegado").await;
        let svc = &env.services.activity_service;

        let mine = svc
            .schedule(activity(&deal.id, ActivityKind::Call, OWNER))
            .await
            .unwrap();
        svc.complete(&mine.id, outcome_by(OWNER)).await.unwrap();

        let delegated = svc
            .schedule(activity(&deal.id, ActivityKind::Task, "beto"))
            .await
            .unwrap();
        svc.complete(&delegated.id, outcome_by("beto")).await.unwrap();

        let inbox = env
            .services
            .notification_service
            .list_for_user(OWNER, false)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::ActividadCompletada);
        assert_eq!(inbox[0].activity_id.as_deref(), Some(delegated.id.as_str()));
    }

    #[actix_rt::test]
    async fn open_for_user_groups_by_kind() {
        let env = test_env().await;
        let deal = env.create_deal("Tablero").await;
        let svc = &env.services.activity_service;
        for kind in [ActivityKind::Task, ActivityKind::Call, ActivityKind::Call] {
            svc.schedule(activity(&deal.id, kind, OWNER)).await.unwrap();
        }
        let closed = svc
            .schedule(activity(&deal.id, ActivityKind::Meeting, OWNER))
            .await
            .unwrap();
        svc.complete(&closed.id, outcome_by(OWNER)).await.unwrap();

        let buckets = svc.open_for_user(OWNER).await.unwrap();
        assert_eq!(buckets.tasks.len(), 1);
        assert_eq!(buckets.calls.len(), 2);
        assert!(buckets.meetings.is_empty());
        assert!(buckets.closed.is_empty());
    }
}
