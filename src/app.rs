//! app.rs
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::app_config::AppConfig;
use crate::handlers::{
    activity_handler, deal_handler, email_handler, follow_up_handler, note_handler,
    notification_handler, webhook_handler,
};
use crate::services::{
    activity_service::ActivityService, deal_service::DealService,
    directory_service::ContactDirectory, email_service::EmailService,
    follow_up_service::FollowUpService, mail_transport::MailTransport,
    note_service::NoteService, notification_service::NotificationService,
};
use actix_web::web;
use sqlx::{Pool, Sqlite};

/// Todos los servicios que comparten los handlers y los jobs.
#[derive(Clone)]
pub struct AppServices {
    pub deal_service: DealService,
    pub activity_service: ActivityService,
    pub note_service: NoteService,
    pub notification_service: NotificationService,
    pub email_service: EmailService,
    pub follow_up_service: FollowUpService,
}

impl AppServices {
    pub fn build(
        db_pool: Pool<Sqlite>,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn MailTransport>,
        config: &AppConfig,
    ) -> Self {
        let directory = ContactDirectory::new(db_pool.clone());

        let notification_service =
            NotificationService::new(db_pool.clone(), clock.clone(), config.engine.clone());
        let deal_service = DealService::new(
            db_pool.clone(),
            clock.clone(),
            directory.clone(),
            config.engine.neglect_threshold(),
        );
        let activity_service =
            ActivityService::new(db_pool.clone(), clock.clone(), notification_service.clone());
        let note_service = NoteService::new(db_pool.clone(), clock.clone());
        let email_service = EmailService::new(
            db_pool.clone(),
            clock.clone(),
            transport,
            directory,
            config.mail.from_name.clone(),
        );
        let follow_up_service = FollowUpService::new(
            db_pool,
            clock,
            email_service.clone(),
            config.engine.clone(),
        );

        Self {
            deal_service,
            activity_service,
            note_service,
            notification_service,
            email_service,
            follow_up_service,
        }
    }

    /// Registra cada servicio como `web::Data` para los handlers.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.deal_service.clone()))
            .app_data(web::Data::new(self.activity_service.clone()))
            .app_data(web::Data::new(self.note_service.clone()))
            .app_data(web::Data::new(self.notification_service.clone()))
            .app_data(web::Data::new(self.email_service.clone()))
            .app_data(web::Data::new(self.follow_up_service.clone()));
    }
}

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tratos")
            .route("", web::get().to(deal_handler::list_deals_endpoint))
            .route("", web::post().to(deal_handler::create_deal_endpoint))
            .route("/filtrar", web::get().to(deal_handler::filter_deals_endpoint))
            // Actividades antes de /{id} para que "actividades" no se tome como id
            .route(
                "/actividades",
                web::post().to(activity_handler::schedule_activity_endpoint),
            )
            .route(
                "/actividades/{id}/completar",
                web::put().to(activity_handler::complete_activity_endpoint),
            )
            .route(
                "/actividades/usuario/{usuarioId}",
                web::get().to(activity_handler::user_activities_endpoint),
            )
            .route("/{id}", web::get().to(deal_handler::get_deal_endpoint))
            .route("/{id}", web::put().to(deal_handler::update_deal_endpoint))
            .route("/{id}", web::delete().to(deal_handler::delete_deal_endpoint))
            .route(
                "/{id}/mover-fase",
                web::put().to(deal_handler::move_phase_endpoint),
            )
            .route(
                "/{id}/desatendido",
                web::get().to(deal_handler::neglected_endpoint),
            )
            .route("/{id}/notas", web::get().to(note_handler::list_notes_endpoint))
            .route("/{id}/notas", web::post().to(note_handler::add_note_endpoint))
            .route(
                "/{id}/notas/{notaId}",
                web::put().to(note_handler::edit_note_endpoint),
            )
            .route(
                "/{id}/notas/{notaId}",
                web::delete().to(note_handler::delete_note_endpoint),
            ),
    )
    .service(
        web::scope("/correos-seguimiento")
            .route(
                "/activar/{tratoId}",
                web::post().to(follow_up_handler::activate_endpoint),
            )
            .route(
                "/desactivar/{tratoId}",
                web::post().to(follow_up_handler::deactivate_endpoint),
            )
            .route(
                "/estado/{tratoId}",
                web::get().to(follow_up_handler::status_endpoint),
            )
            .route(
                "/procesar-manual",
                web::post().to(follow_up_handler::run_now_endpoint),
            )
            .route(
                "/verificar-pendientes",
                web::post().to(follow_up_handler::pending_endpoint),
            ),
    )
    .service(
        web::scope("/notificaciones")
            .route(
                "/user",
                web::get().to(notification_handler::list_user_notifications_endpoint),
            )
            .route(
                "/user/contador-no-leidas",
                web::get().to(notification_handler::unread_count_endpoint),
            )
            .route(
                "/marcar-todas-leidas",
                web::post().to(notification_handler::mark_all_read_endpoint),
            )
            .route(
                "/limpiar-leidas",
                web::post().to(notification_handler::cleanup_read_endpoint),
            )
            .route(
                "/limpiar-leidas-manual",
                web::post().to(notification_handler::cleanup_read_manual_endpoint),
            )
            .route(
                "/verificar-programadas",
                web::post().to(notification_handler::check_scheduled_endpoint),
            )
            .route(
                "/{id}/marcar-leida",
                web::post().to(notification_handler::mark_read_endpoint),
            ),
    )
    .service(
        web::scope("/correos")
            .route("", web::post().to(email_handler::send_email_endpoint))
            .route(
                "/plantilla",
                web::post().to(email_handler::send_templated_email_endpoint),
            )
            .route(
                "/trato/{tratoId}",
                web::get().to(email_handler::deal_emails_endpoint),
            ),
    )
    .service(
        web::scope("/webhooks").route(
            "/resend",
            web::post().to(webhook_handler::resend_webhook_endpoint),
        ),
    );
}
