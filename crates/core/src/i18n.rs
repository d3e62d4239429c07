//! Dialog copy for every supported language.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
}

impl Language {
    pub fn toggled(self) -> Self {
        match self {
            Self::En => Self::Es,
            Self::Es => Self::En,
        }
    }

    pub fn copy(self) -> &'static DialogCopy {
        match self {
            Self::En => &EN,
            Self::Es => &ES,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "es" | "spanish" | "español" => Ok(Self::Es),
            other => Err(format!("unsupported language `{other}` (expected en|es)")),
        }
    }
}

#[derive(Debug)]
pub struct DialogCopy {
    pub greeting: &'static str,
    pub estimate_btn: &'static str,
    pub emergency_btn: &'static str,
    pub question_btn: &'static str,
    pub lang_toggle: &'static str,
    pub estimate_q1: &'static str,
    pub estimate_q2: &'static str,
    pub estimate_invalid_sqft: &'static str,
    pub estimate_result: &'static str,
    pub estimate_follow: &'static str,
    pub emergency_alert: &'static str,
    pub emergency_info: &'static str,
    pub emergency_warning: &'static str,
    pub emergency_warning2: &'static str,
    pub question_prompt: &'static str,
    pub licensing_answer: &'static str,
    pub warranty_answer: &'static str,
    pub timeline_answer: &'static str,
    pub safety_answer: &'static str,
    pub anything_else: &'static str,
    pub no_thanks: &'static str,
    pub farewell: &'static str,
    pub fallback_prompt: &'static str,
    pub use_contact_form: &'static str,
    pub thank_you: &'static str,
    pub resume_prompt: &'static str,
    pub exit_intent_promo: &'static str,
    pub online: &'static str,
    pub offline: &'static str,
    pub start_chat: &'static str,
    pub business_hours: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum QuestionTopic {
    Licensing,
    Warranty,
    Timeline,
    Safety,
}

impl QuestionTopic {
    pub const ALL: [QuestionTopic; 4] =
        [Self::Licensing, Self::Warranty, Self::Timeline, Self::Safety];

    pub fn value(self) -> &'static str {
        match self {
            Self::Licensing => "licensing",
            Self::Warranty => "warranty",
            Self::Timeline => "timeline",
            Self::Safety => "safety",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.value() == value)
    }

    pub fn label(self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Licensing, Language::En) => "Licensing & Insurance",
            (Self::Warranty, Language::En) => "Warranty Information",
            (Self::Timeline, Language::En) => "Project Timeline",
            (Self::Safety, Language::En) => "Safety Certifications",
            (Self::Licensing, Language::Es) => "Licencias y Seguro",
            (Self::Warranty, Language::Es) => "Información de Garantía",
            (Self::Timeline, Language::Es) => "Tiempos del Proyecto",
            (Self::Safety, Language::Es) => "Certificaciones de Seguridad",
        }
    }

    pub fn answer(self, language: Language) -> &'static str {
        let copy = language.copy();
        match self {
            Self::Licensing => copy.licensing_answer,
            Self::Warranty => copy.warranty_answer,
            Self::Timeline => copy.timeline_answer,
            Self::Safety => copy.safety_answer,
        }
    }

    /// Topic named by typed text, e.g. "what about the warranty?".
    pub fn match_text(text: &str) -> Option<Self> {
        let normalized = text.trim().to_lowercase();
        let keywords: [(Self, &[&str]); 4] = [
            (Self::Licensing, &["licens", "insur", "licencia", "seguro"]),
            (Self::Warranty, &["warrant", "guarantee", "garant"]),
            (Self::Timeline, &["timeline", "how long", "schedule", "tiempo", "cuánto tarda"]),
            (Self::Safety, &["safety", "osha", "segur"]),
        ];

        keywords
            .into_iter()
            .find(|(_, words)| words.iter().any(|word| normalized.contains(word)))
            .map(|(topic, _)| topic)
    }
}

static EN: DialogCopy = DialogCopy {
    greeting: "Hi! 👋 I'm the M. Alam Virtual Assistant. Are you looking for a Fast Estimate on a project, or do you have a Construction Emergency that needs immediate attention?",
    estimate_btn: "I need a Project Estimate",
    emergency_btn: "🚨 EMERGENCY / DOB Violation",
    question_btn: "Just have a question",
    lang_toggle: "Hablamos Español",
    estimate_q1: "Great! To give you a ballpark range, what are we working on?",
    estimate_q2: "Roughly how many square feet is the area?",
    estimate_invalid_sqft: "I didn't catch a number there. Roughly how many square feet is the area?",
    estimate_result: "Got it! Based on recent NYC projects, that typically ranges from",
    estimate_follow: "Want me to email you a detailed breakdown and schedule a visit to lock in a final price?",
    emergency_alert: "I'm alerting our on-call supervisor right now. 🚨",
    emergency_info: "Please provide your Phone Number and Address below so we can dispatch help or call you back within minutes.",
    emergency_warning: "If this is a structural collapse or gas leak, please call",
    emergency_warning2: "immediately while I process this alert.",
    question_prompt: "I can help with that! What would you like to know about?",
    licensing_answer: "M. Alam General Construction is fully licensed and insured in NYC. We hold all required DOB licenses and carry $2M+ in liability coverage. Our license number is MAL-GC-2024.",
    warranty_answer: "We provide a comprehensive 1-year workmanship warranty on all projects. Material warranties from manufacturers typically range from 5-25 years depending on the product.",
    timeline_answer: "Project timelines vary: Bathroom remodels take 2-3 weeks, kitchen renovations 4-6 weeks, and full home renovations 2-4 months. We'll provide a detailed schedule during your free consultation.",
    safety_answer: "We are 100% OSHA-compliant. All our foremen hold OSHA 30-hour certifications, and every worker has OSHA 10-hour training. Safety is non-negotiable on our job sites.",
    anything_else: "Is there anything else I can help you with?",
    no_thanks: "No, thank you!",
    farewell: "Thanks for stopping by! We're here whenever you need us.",
    fallback_prompt: "I want to make sure I get you to the right person. Which of these fits best?",
    use_contact_form: "Please use the form below so our team can reach you.",
    thank_you: "Thank you! Our team will contact you shortly. For immediate assistance, call",
    resume_prompt: "Welcome back! Would you like to pick up where you left off?",
    exit_intent_promo: "Before you go: get a free ballpark estimate in under a minute. No obligation!",
    online: "Online - We reply in ~3 mins",
    offline: "Leave a message",
    start_chat: "Start Conversation",
    business_hours: "Business Hours: Mon-Fri, 8AM - 5PM EST",
};

static ES: DialogCopy = DialogCopy {
    greeting: "¡Hola! 👋 Soy el Asistente Virtual de M. Alam. ¿Busca un Presupuesto Rápido para un proyecto o tiene una Emergencia de Construcción que necesita atención inmediata?",
    estimate_btn: "Necesito un Presupuesto",
    emergency_btn: "🚨 EMERGENCIA / Violación DOB",
    question_btn: "Solo tengo una pregunta",
    lang_toggle: "English",
    estimate_q1: "¡Excelente! Para darle un rango aproximado, ¿en qué estamos trabajando?",
    estimate_q2: "¿Aproximadamente cuántos pies cuadrados tiene el área?",
    estimate_invalid_sqft: "No entendí el número. ¿Aproximadamente cuántos pies cuadrados tiene el área?",
    estimate_result: "¡Entendido! Basado en proyectos recientes en NYC, eso típicamente varía de",
    estimate_follow: "¿Quiere que le envíe un desglose detallado por correo y programemos una visita para fijar un precio final?",
    emergency_alert: "Estoy alertando a nuestro supervisor de guardia ahora mismo. 🚨",
    emergency_info: "Por favor proporcione su Número de Teléfono y Dirección abajo para que podamos enviar ayuda o llamarle en minutos.",
    emergency_warning: "Si esto es un colapso estructural o fuga de gas, por favor llame al",
    emergency_warning2: "inmediatamente mientras proceso esta alerta.",
    question_prompt: "¡Puedo ayudar con eso! ¿Qué le gustaría saber?",
    licensing_answer: "M. Alam General Construction está completamente licenciado y asegurado en NYC. Tenemos todas las licencias DOB requeridas y $2M+ en cobertura de responsabilidad.",
    warranty_answer: "Proporcionamos una garantía integral de 1 año en mano de obra. Las garantías de materiales de fabricantes típicamente van de 5-25 años.",
    timeline_answer: "Los tiempos varían: Remodelaciones de baño toman 2-3 semanas, cocinas 4-6 semanas, y renovaciones completas 2-4 meses.",
    safety_answer: "Cumplimos 100% con OSHA. Todos nuestros capataces tienen certificación OSHA de 30 horas. La seguridad no es negociable.",
    anything_else: "¿Hay algo más en lo que pueda ayudarle?",
    no_thanks: "¡No, gracias!",
    farewell: "¡Gracias por visitarnos! Estamos aquí cuando nos necesite.",
    fallback_prompt: "Quiero asegurarme de comunicarle con la persona correcta. ¿Cuál de estas opciones le describe mejor?",
    use_contact_form: "Por favor use el formulario de abajo para que nuestro equipo pueda contactarle.",
    thank_you: "¡Gracias! Nuestro equipo le contactará pronto. Para asistencia inmediata, llame al",
    resume_prompt: "¡Bienvenido de nuevo! ¿Desea continuar donde lo dejó?",
    exit_intent_promo: "Antes de irse: obtenga un presupuesto aproximado gratis en menos de un minuto. ¡Sin compromiso!",
    online: "En línea - Respondemos en ~3 mins",
    offline: "Deje un mensaje",
    start_chat: "Iniciar Conversación",
    business_hours: "Horario: Lun-Vie, 8AM - 5PM EST",
};
