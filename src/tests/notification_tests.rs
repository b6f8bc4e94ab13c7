//! tests/notification_tests.rs
//! Pruebas de `NotificationService`: revisión programada, deduplicación, lectura y limpieza.

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::app::AppServices;
    use crate::config::app_config::AppConfig;
    use crate::error::ServiceError;
    use crate::models::activity_model::{ActivityKind, ScheduleActivityRequest};
    use crate::models::deal_model::CreateDealRequest;
    use crate::models::notification_model::{NewNotification, NotificationKind, NotificationStatus};
    use crate::tests::support::{deal_request, start_time, test_env, OWNER};

    fn call_due_at(deal_id: &str, offset: Duration) -> ScheduleActivityRequest {
        let due = start_time() + offset;
        ScheduleActivityRequest {
            deal_id: deal_id.to_string(),
            kind: ActivityKind::Call,
            task_subtype: None,
            assignee_id: "beto".to_string(),
            title: Some("Seguimiento telefónico".to_string()),
            due_date: due.date_naive(),
            start_time: Some(due.time()),
            duration_minutes: Some(30),
        }
    }

    fn manual(user: &str, message: &str) -> NewNotification {
        NewNotification {
            user_id: user.to_string(),
            kind: NotificationKind::ActividadProxima,
            message: message.to_string(),
            deal_id: None,
            activity_id: None,
        }
    }

    #[actix_rt::test]
    async fn check_twice_creates_one_notification() {
        let env = test_env().await;
        let deal = env.create_deal("Próxima llamada").await;
        env.services
            .activity_service
            .schedule(call_due_at(&deal.id, Duration::minutes(30)))
            .await
            .unwrap();
        let svc = &env.services.notification_service;

        let first = svc.check_scheduled().await.unwrap();
        assert_eq!(first.created, 1);
        let second = svc.check_scheduled().await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.duplicates, 1);

        let inbox = svc.list_for_user("beto", false).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::ActividadProxima);
        assert_eq!(inbox[0].status, NotificationStatus::Unread);
        assert_eq!(inbox[0].deal_id.as_deref(), Some(deal.id.as_str()));
    }

    #[actix_rt::test]
    async fn long_lookahead_notifies_an_activity_once() {
        let env = test_env().await;
        let deal = env.create_deal("Con anticipación").await;
        env.services
            .activity_service
            .schedule(call_due_at(&deal.id, Duration::minutes(110)))
            .await
            .unwrap();

        let mut config = AppConfig::default();
        config.engine.notification_lookahead_minutes = 120;
        config.engine.activity_dedup_minutes = 30;
        let services = AppServices::build(
            env.pool.clone(),
            env.clock.clone(),
            env.transport.clone(),
            &config,
        );
        let svc = &services.notification_service;

        assert_eq!(svc.check_scheduled().await.unwrap().created, 1);
        env.clock.advance(Duration::minutes(45));
        assert_eq!(svc.check_scheduled().await.unwrap().created, 0);
        env.clock.advance(Duration::minutes(45));
        assert_eq!(svc.check_scheduled().await.unwrap().created, 0);
        assert_eq!(svc.list_for_user("beto", false).await.unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn activities_outside_the_lookahead_are_ignored() {
        let env = test_env().await;
        let deal = env.create_deal("Lejana").await;
        env.services
            .activity_service
            .schedule(call_due_at(&deal.id, Duration::hours(5)))
            .await
            .unwrap();

        let report = env
            .services
            .notification_service
            .check_scheduled()
            .await
            .unwrap();
        assert_eq!(report.candidates, 0);
    }

    #[actix_rt::test]
    async fn overdue_activities_notify_the_assignee() {
        let env = test_env().await;
        let deal = env.create_deal("Vencida").await;
        env.services
            .activity_service
            .schedule(call_due_at(&deal.id, Duration::minutes(30)))
            .await
            .unwrap();
        env.clock.advance(Duration::hours(2));

        env.services
            .notification_service
            .check_scheduled()
            .await
            .unwrap();
        let inbox = env
            .services
            .notification_service
            .list_for_user("beto", false)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::ActividadVencida);
    }

    #[actix_rt::test]
    async fn neglected_and_closing_deals_notify_the_owner() {
        let env = test_env().await;
        env.create_deal("Desatendido").await;
        env.clock.advance(Duration::days(8));
        env.services
            .deal_service
            .create_deal(CreateDealRequest {
                target_close_date: Some((start_time() + Duration::days(10)).date_naive()),
                ..deal_request("Cierra pronto")
            })
            .await
            .unwrap();

        let svc = &env.services.notification_service;
        let report = svc.check_scheduled().await.unwrap();
        assert_eq!(report.created, 2);

        let kinds: Vec<_> = svc
            .list_for_user(OWNER, false)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert!(kinds.contains(&NotificationKind::TratoDesatendido));
        assert!(kinds.contains(&NotificationKind::TratoCierreProximo));

        // Las alertas de trato se repiten a lo sumo una vez al día
        env.clock.advance(Duration::hours(12));
        assert_eq!(svc.check_scheduled().await.unwrap().created, 0);
        env.clock.advance(Duration::hours(13));
        assert_eq!(svc.check_scheduled().await.unwrap().created, 2);
    }

    #[actix_rt::test]
    async fn dedup_is_per_user_kind_and_message() {
        let env = test_env().await;
        let svc = &env.services.notification_service;

        assert!(svc.dispatch(manual("ana", "Hola")).await.unwrap());
        assert!(!svc.dispatch(manual("ana", "Hola")).await.unwrap());
        assert!(svc.dispatch(manual("beto", "Hola")).await.unwrap());
        assert!(svc.dispatch(manual("ana", "Otro mensaje")).await.unwrap());

        env.clock.advance(Duration::minutes(61));
        assert!(svc.dispatch(manual("ana", "Hola")).await.unwrap());
    }

    #[actix_rt::test]
    async fn mark_read_is_idempotent() {
        let env = test_env().await;
        let svc = &env.services.notification_service;
        svc.dispatch(manual(OWNER, "Léeme")).await.unwrap();
        let id = svc.list_for_user(OWNER, true).await.unwrap()[0].id.clone();

        let read = svc.mark_read(&id).await.unwrap();
        assert_eq!(read.status, NotificationStatus::Read);
        assert_eq!(read.read_at, Some(start_time()));

        env.clock.advance(Duration::hours(1));
        let again = svc.mark_read(&id).await.unwrap();
        assert_eq!(again.read_at, Some(start_time()));

        assert_eq!(svc.unread_count(OWNER).await.unwrap(), 0);
        assert!(svc.list_for_user(OWNER, true).await.unwrap().is_empty());

        let err = svc.mark_read("no-existe").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn mark_all_read_only_touches_that_user() {
        let env = test_env().await;
        let svc = &env.services.notification_service;
        svc.dispatch(manual(OWNER, "uno")).await.unwrap();
        svc.dispatch(manual(OWNER, "dos")).await.unwrap();
        svc.dispatch(manual("beto", "tres")).await.unwrap();

        assert_eq!(svc.mark_all_read(OWNER).await.unwrap(), 2);
        assert_eq!(svc.mark_all_read(OWNER).await.unwrap(), 0);
        assert_eq!(svc.unread_count("beto").await.unwrap(), 1);
    }

    #[actix_rt::test]
    async fn cleanup_deletes_only_old_read_rows() {
        let env = test_env().await;
        let svc = &env.services.notification_service;

        svc.dispatch(manual(OWNER, "vieja leída")).await.unwrap();
        svc.dispatch(manual(OWNER, "vieja sin leer")).await.unwrap();
        let old_read = svc
            .list_for_user(OWNER, false)
            .await
            .unwrap()
            .into_iter()
            .find(|n| n.message == "vieja leída")
            .unwrap();
        svc.mark_read(&old_read.id).await.unwrap();

        env.clock.advance(Duration::days(20));
        svc.dispatch(manual(OWNER, "reciente")).await.unwrap();
        svc.mark_all_read(OWNER).await.unwrap();
        // "vieja sin leer" se marcó leída recién ahora, en el día 20

        env.clock.advance(Duration::days(11));
        let deleted = svc.cleanup_read(Duration::days(30)).await.unwrap();
        assert_eq!(deleted, 1);

        let left: Vec<_> = svc
            .list_for_user(OWNER, false)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(left.len(), 2);
        assert!(!left.contains(&"vieja leída".to_string()));
    }

    #[actix_rt::test]
    async fn cleanup_never_touches_unread() {
        let env = test_env().await;
        let svc = &env.services.notification_service;
        svc.dispatch(manual(OWNER, "pendiente")).await.unwrap();
        env.clock.advance(Duration::days(365));

        assert_eq!(svc.cleanup_read(Duration::days(30)).await.unwrap(), 0);
        assert_eq!(svc.unread_count(OWNER).await.unwrap(), 1);
        assert!(svc.cleanup_read(Duration::days(-1)).await.is_err());
    }

    #[actix_rt::test]
    async fn cleanup_with_out_of_range_retention_is_invalid() {
        let env = test_env().await;
        let svc = &env.services.notification_service;
        svc.dispatch(manual(OWNER, "leída")).await.unwrap();
        svc.mark_all_read(OWNER).await.unwrap();

        let err = svc
            .cleanup_read(Duration::days(100_000_000))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(env.count("SELECT COUNT(*) FROM notificaciones").await, 1);
    }
}
