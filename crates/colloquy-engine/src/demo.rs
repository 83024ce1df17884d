use std::sync::Mutex;

use async_trait::async_trait;
use colloquy_types::{estimate_tokens, ChatTurn, Envelope, GenerationOptions, ReplyStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::ResponseBackend;

pub const DEMO_BACKEND_ID: &str = "demo-mode";

struct Category {
    name: &'static str,
    keywords: &'static [&'static str],
    reply: &'static str,
}

/// Keyword categories checked in order; the first hit wins, so a greeting
/// is matched before a status inquiry.
const CATEGORIES: &[Category] = &[
    Category {
        name: "greeting",
        keywords: &["olá", "oi", "hello", "bom dia", "boa tarde", "boa noite"],
        reply: "Olá! Sou a Lia, sua assistente de IA. É um prazer conversar com você! \
                Como posso ajudá-lo hoje?",
    },
    Category {
        name: "status",
        keywords: &["como", "você", "está", "vai"],
        reply: "Estou muito bem, obrigada por perguntar! Estou funcionando perfeitamente \
                e pronta para ajudar. E você, como está?",
    },
    Category {
        name: "identity",
        keywords: &["nome", "quem", "você"],
        reply: "Eu sou a Lia, uma inteligência artificial criada para ser sua assistente \
                pessoal. Fui desenvolvida para ser amigável, útil e sempre disposta a aprender!",
    },
    Category {
        name: "help",
        keywords: &["ajuda", "help", "socorro"],
        reply: "Claro! Estou aqui para ajudar. Posso conversar sobre diversos assuntos, \
                responder perguntas, dar sugestões e muito mais. O que você gostaria de saber?",
    },
    Category {
        name: "thanks",
        keywords: &["obrigado", "obrigada", "thanks", "valeu"],
        reply: "De nada! Fico feliz em poder ajudar. Se precisar de mais alguma coisa, \
                é só me chamar!",
    },
    Category {
        name: "farewell",
        keywords: &["tchau", "bye", "até logo", "adeus"],
        reply: "Até logo! Foi um prazer conversar com você. Volte sempre que quiser \
                bater um papo!",
    },
];

/// Replies used when no category matches.
const FALLBACK_POOL: &[&str] = &[
    "Olá! Sou a Lia, sua assistente de IA. Como posso ajudá-lo hoje?",
    "Que pergunta interessante! Vou fazer o meu melhor para responder.",
    "Estou aqui para conversar e ajudar no que você precisar. O que gostaria de saber?",
    "Como uma IA em desenvolvimento, estou sempre aprendendo. Conte-me mais sobre isso!",
    "Essa é uma ótima questão! Deixe-me pensar na melhor forma de responder.",
    "Adoro conversar sobre diferentes tópicos. Qual é o seu interesse principal?",
    "Sou uma IA criada para ser útil e amigável. Como posso tornar seu dia melhor?",
    "Interessante perspectiva! Você poderia elaborar mais sobre esse ponto?",
    "Estou funcionando em modo demonstração, mas posso ter conversas significativas!",
    "Que bom conversar com você! Há algo específico que gostaria de discutir?",
];

/// Name of the first category whose keyword list hits the message,
/// case-insensitive substring containment.
pub fn category_for(message: &str) -> Option<&'static str> {
    let lowered = message.to_lowercase();
    CATEGORIES
        .iter()
        .find(|category| category.keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|category| category.name)
}

/// Rule-based variant. Always available; also serves as the fallback for
/// the remote and local variants.
pub struct DemoBackend {
    rng: Mutex<StdRng>,
}

impl DemoBackend {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic fallback picks for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn reply_for(&self, message: &str) -> String {
        let lowered = message.to_lowercase();
        for category in CATEGORIES {
            if category.keywords.iter().any(|kw| lowered.contains(kw)) {
                return category.reply.to_string();
            }
        }
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0..FALLBACK_POOL.len())
        };
        FALLBACK_POOL[index].to_string()
    }
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseBackend for DemoBackend {
    fn name(&self) -> &str {
        DEMO_BACKEND_ID
    }

    async fn generate(
        &self,
        message: &str,
        _context: &[ChatTurn],
        _options: &GenerationOptions,
    ) -> Envelope {
        let text = self.reply_for(message);
        let tokens = estimate_tokens(&text);
        Envelope::new(text, tokens, DEMO_BACKEND_ID, ReplyStatus::Demo)
    }
}
