//! tests/http_tests.rs
//! Pruebas de las rutas HTTP con `actix_web::test`.

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    use crate::app;
    use crate::tests::support::{test_env, TestEnv, OWNER};

    macro_rules! init_app {
        ($env:expr) => {{
            let services = $env.services.clone();
            test::init_service(
                App::new()
                    .configure(move |cfg| services.configure(cfg))
                    .configure(app::init_app),
            )
            .await
        }};
    }

    async fn create_deal_json(env: &TestEnv) -> Value {
        let app = init_app!(env);
        let req = test::TestRequest::post()
            .uri("/tratos")
            .set_json(json!({
                "name": "Flotilla HTTP",
                "ownerId": OWNER,
                "companyId": "emp-1",
                "contactId": "con-1",
                "expectedAmount": 90000.0,
                "currency": "MXN",
                "followUpActive": true
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        test::read_body_json(resp).await
    }

    #[actix_rt::test]
    async fn create_then_get_deal_detail() {
        let env = test_env().await;
        let created = create_deal_json(&env).await;
        let id = created["id"].as_str().unwrap();
        assert_eq!(created["phase"], "CLASIFICACION");
        assert_eq!(created["followUpActive"], true);

        let app = init_app!(env);
        let req = test::TestRequest::get()
            .uri(&format!("/tratos/{id}"))
            .to_request();
        let detail: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(detail["id"], id);
        assert_eq!(detail["neglected"], false);
        assert_eq!(detail["companyName"], "Transportes del Norte");
        assert!(detail["activities"]["tasks"].as_array().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn filter_route_is_not_taken_as_an_id() {
        let env = test_env().await;
        create_deal_json(&env).await;

        let app = init_app!(env);
        let req = test::TestRequest::get()
            .uri(&format!("/tratos/filtrar?propietarioId={OWNER}"))
            .to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn unknown_deal_is_404() {
        let env = test_env().await;
        let app = init_app!(env);
        let req = test::TestRequest::get().uri("/tratos/no-existe").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_rt::test]
    async fn move_phase_validates_and_closes_follow_up() {
        let env = test_env().await;
        let created = create_deal_json(&env).await;
        let id = created["id"].as_str().unwrap();
        let app = init_app!(env);

        let req = test::TestRequest::put()
            .uri(&format!("/tratos/{id}/mover-fase?nuevaFase=NOT_A_PHASE"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::put()
            .uri(&format!("/tratos/{id}/mover-fase?nuevaFase=CERRADO_GANADO"))
            .to_request();
        let moved: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(moved["phase"], "CERRADO_GANADO");
        assert_eq!(moved["followUpActive"], false);

        let req = test::TestRequest::post()
            .uri(&format!("/correos-seguimiento/activar/{id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_rt::test]
    async fn schedule_and_complete_activity_over_http() {
        let env = test_env().await;
        let created = create_deal_json(&env).await;
        let deal_id = created["id"].as_str().unwrap();
        let app = init_app!(env);

        let req = test::TestRequest::post()
            .uri("/tratos/actividades")
            .set_json(json!({
                "dealId": deal_id,
                "kind": "TASK",
                "taskSubtype": "CORREO",
                "assigneeId": OWNER,
                "title": "Enviar catálogo",
                "dueDate": "2024-05-02"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let activity: Value = test::read_body_json(resp).await;
        let activity_id = activity["id"].as_str().unwrap();

        let complete = json!({
            "completedBy": OWNER,
            "response": true,
            "interestLevel": "MEDIO",
            "infoSent": true,
            "nextAction": "Llamar el lunes"
        });
        let req = test::TestRequest::put()
            .uri(&format!("/tratos/actividades/{activity_id}/completar"))
            .set_json(&complete)
            .to_request();
        let done: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(done["status"], "CLOSED");
        assert_eq!(done["outcome"]["interestLevel"], "MEDIO");

        let req = test::TestRequest::put()
            .uri(&format!("/tratos/actividades/{activity_id}/completar"))
            .set_json(&complete)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri(&format!("/tratos/actividades/usuario/{OWNER}"))
            .to_request();
        let buckets: Value = test::call_and_read_body_json(&app, req).await;
        assert!(buckets["tasks"].as_array().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn notes_crud() {
        let env = test_env().await;
        let created = create_deal_json(&env).await;
        let deal_id = created["id"].as_str().unwrap();
        let app = init_app!(env);

        let req = test::TestRequest::post()
            .uri(&format!("/tratos/{deal_id}/notas"))
            .set_json(json!({ "authorId": OWNER, "content": "Primera nota" }))
            .to_request();
        let note: Value = test::call_and_read_body_json(&app, req).await;
        let note_id = note["id"].as_str().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/tratos/{deal_id}/notas/{note_id}"))
            .set_json(json!({ "editorId": "beto", "content": "Nota corregida" }))
            .to_request();
        let edited: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(edited["content"], "Nota corregida");
        assert_eq!(edited["editedBy"], "beto");

        let req = test::TestRequest::delete()
            .uri(&format!("/tratos/{deal_id}/notas/{note_id}"))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::get()
            .uri(&format!("/tratos/{deal_id}/notas"))
            .to_request();
        let notes: Value = test::call_and_read_body_json(&app, req).await;
        assert!(notes.as_array().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn manual_follow_up_run_and_status() {
        let env = test_env().await;
        let created = create_deal_json(&env).await;
        let deal_id = created["id"].as_str().unwrap();
        let app = init_app!(env);

        let req = test::TestRequest::post()
            .uri("/correos-seguimiento/verificar-pendientes")
            .to_request();
        let pending: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending["total"], 1);

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/correos-seguimiento/procesar-manual")
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri(&format!("/correos-seguimiento/estado/{deal_id}"))
            .to_request();
        let status: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["sentCount"], 1);
        assert_eq!(status["followUpActive"], true);

        let req = test::TestRequest::get()
            .uri(&format!("/correos/trato/{deal_id}"))
            .to_request();
        let records: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(records.as_array().unwrap().len(), 1);
        assert_eq!(records[0]["kind"], "SEGUIMIENTO");
    }

    #[actix_rt::test]
    async fn failed_direct_send_is_502_with_record_id() {
        let env = test_env().await;
        env.transport.set_failing(true);
        let app = init_app!(env);

        let req = test::TestRequest::post()
            .uri("/correos")
            .set_json(json!({
                "recipient": "compras@cliente.mx",
                "subject": "Hola",
                "body": "<p>Hola</p>"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["recordId"].as_str().is_some());
    }

    #[actix_rt::test]
    async fn webhook_updates_delivery_status() {
        let env = test_env().await;
        let app = init_app!(env);

        let req = test::TestRequest::post()
            .uri("/correos")
            .set_json(json!({
                "recipient": "compras@cliente.mx",
                "subject": "Hola",
                "body": "<p>Hola</p>"
            }))
            .to_request();
        let sent: Value = test::call_and_read_body_json(&app, req).await;
        let provider_id = sent["providerMessageId"].as_str().unwrap();

        let req = test::TestRequest::post()
            .uri("/webhooks/resend")
            .set_json(json!({
                "type": "email.delivered",
                "created_at": "2024-05-01T09:00:05Z",
                "data": { "email_id": provider_id, "to": ["compras@cliente.mx"] }
            }))
            .to_request();
        let ack: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(ack["actualizados"], 1);
    }

    #[actix_rt::test]
    async fn notification_endpoints() {
        let env = test_env().await;
        let created = create_deal_json(&env).await;
        let deal_id = created["id"].as_str().unwrap();
        let app = init_app!(env);

        let req = test::TestRequest::post()
            .uri("/tratos/actividades")
            .set_json(json!({
                "dealId": deal_id,
                "kind": "CALL",
                "assigneeId": OWNER,
                "dueDate": "2024-05-01",
                "startTime": "09:45:00"
            }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CREATED
        );

        let req = test::TestRequest::post()
            .uri("/notificaciones/verificar-programadas")
            .to_request();
        let report: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(report["created"], 1);

        let req = test::TestRequest::get()
            .uri(&format!("/notificaciones/user/contador-no-leidas?usuarioId={OWNER}"))
            .to_request();
        let counter: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(counter["noLeidas"], 1);

        let req = test::TestRequest::get()
            .uri(&format!("/notificaciones/user?usuarioId={OWNER}&soloNoLeidas=true"))
            .to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        let notification_id = list[0]["id"].as_str().unwrap();

        let req = test::TestRequest::post()
            .uri(&format!("/notificaciones/{notification_id}/marcar-leida"))
            .to_request();
        let read: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(read["status"], "READ");

        let req = test::TestRequest::post()
            .uri(&format!("/notificaciones/marcar-todas-leidas?usuarioId={OWNER}"))
            .to_request();
        let all: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all["actualizadas"], 0);

        let req = test::TestRequest::post()
            .uri("/notificaciones/limpiar-leidas-manual?dias=0")
            .to_request();
        let cleaned: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(cleaned["eliminadas"], 0);

        for dias in ["-1", "100000000", "9223372036854775807"] {
            let req = test::TestRequest::post()
                .uri(&format!("/notificaciones/limpiar-leidas-manual?dias={dias}"))
                .to_request();
            assert_eq!(
                test::call_service(&app, req).await.status(),
                StatusCode::BAD_REQUEST,
                "dias={dias}"
            );
        }

        let req = test::TestRequest::post()
            .uri("/notificaciones/no-existe/marcar-leida")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }
}
