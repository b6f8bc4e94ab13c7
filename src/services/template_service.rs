//! services/template_service.rs
//! Plantillas de correo embebidas con sustitución `{{variable}}`.

use std::collections::HashMap;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailTemplate {
    pub name: &'static str,
    pub subject: &'static str,
    pub body: &'static str,
}

/// Secuencia de seguimiento automático; el envío N usa `FOLLOW_UP_SEQUENCE[N % len]`.
const FOLLOW_UP_SEQUENCE: [EmailTemplate; 3] = [
    EmailTemplate {
        name: "SEGUIMIENTO_1",
        subject: "{{trato}}: ¿pudo revisar nuestra propuesta?",
        body: "<p>Hola {{contacto}},</p>\
               <p>Le escribimos para dar seguimiento a <strong>{{trato}}</strong> con {{empresa}}. \
               Quedamos atentos a cualquier duda sobre la información que le compartimos.</p>\
               <p>Saludos,<br/>{{remitente}}</p>",
    },
    EmailTemplate {
        name: "SEGUIMIENTO_2",
        subject: "{{trato}}: seguimos a sus órdenes",
        body: "<p>Hola {{contacto}},</p>\
               <p>¿Le gustaría agendar una llamada breve para revisar los siguientes pasos de \
               <strong>{{trato}}</strong>?</p>\
               <p>Saludos,<br/>{{remitente}}</p>",
    },
    EmailTemplate {
        name: "SEGUIMIENTO_3",
        subject: "{{trato}}: ¿retomamos la conversación?",
        body: "<p>Hola {{contacto}},</p>\
               <p>No queremos saturar su bandeja. Si {{empresa}} sigue interesada en \
               <strong>{{trato}}</strong>, responda este correo y le contactamos.</p>\
               <p>Saludos,<br/>{{remitente}}</p>",
    },
];

const MANUAL_TEMPLATES: [EmailTemplate; 2] = [
    EmailTemplate {
        name: "PRESENTACION",
        subject: "Presentación para {{empresa}}",
        body: "<p>Hola {{contacto}},</p>\
               <p>Gracias por su tiempo. Adjuntamos la información de <strong>{{trato}}</strong>.</p>\
               <p>{{mensaje}}</p><p>Saludos,<br/>{{remitente}}</p>",
    },
    EmailTemplate {
        name: "COTIZACION",
        subject: "Cotización {{trato}}",
        body: "<p>Hola {{contacto}},</p>\
               <p>Compartimos la cotización de <strong>{{trato}}</strong> por {{monto}}.</p>\
               <p>{{mensaje}}</p><p>Saludos,<br/>{{remitente}}</p>",
    },
];

pub fn follow_up_template(sequence: i64) -> &'static EmailTemplate {
    let idx = sequence.rem_euclid(FOLLOW_UP_SEQUENCE.len() as i64) as usize;
    &FOLLOW_UP_SEQUENCE[idx]
}

pub fn find_template(name: &str) -> ServiceResult<&'static EmailTemplate> {
    FOLLOW_UP_SEQUENCE
        .iter()
        .chain(MANUAL_TEMPLATES.iter())
        .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| ServiceError::InvalidArgument(format!("Plantilla desconocida: {name}")))
}

/// Sustituye `{{clave}}`; las claves sin valor quedan vacías.
pub fn render(text: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl EmailTemplate {
    pub fn render(&self, vars: &HashMap<String, String>) -> (String, String) {
        (render(self.subject, vars), render(self.body, vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> HashMap<String, String> {
        HashMap::from([
            ("contacto".to_string(), "Lucía".to_string()),
            ("trato".to_string(), "Flotilla 2024".to_string()),
        ])
    }

    #[test]
    fn substitutes_known_keys_and_drops_unknown() {
        let out = render("Hola {{contacto}}, {{ trato }}{{falta}}!", &vars());
        assert_eq!(out, "Hola Lucía, Flotilla 2024!");
    }

    #[test]
    fn unterminated_placeholder_is_kept_verbatim() {
        assert_eq!(render("abc {{contacto", &vars()), "abc {{contacto");
    }

    #[test]
    fn follow_up_sequence_cycles() {
        assert_eq!(follow_up_template(0).name, "SEGUIMIENTO_1");
        assert_eq!(follow_up_template(3).name, "SEGUIMIENTO_1");
        assert_eq!(follow_up_template(4).name, "SEGUIMIENTO_2");
    }

    #[test]
    fn finds_templates_case_insensitively() {
        assert_eq!(find_template("cotizacion").unwrap().name, "COTIZACION");
        assert!(find_template("NOPE").is_err());
    }
}
