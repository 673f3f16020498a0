//! RAG chat orchestrator.
//!
//! Runs the per-request pipeline: categorize the query, retrieve grounding
//! context from the vector index, generate a context-bound answer, then
//! fuse category and response confidence into a single score. Every stage
//! has a defined fallback; [`SupportAgent::process_chat`] never returns an
//! error to its caller — the worst case is the localized apology with
//! confidence 0.1.

use std::sync::Arc;
use std::time::Duration;

use crate::embedding::EmbeddingProvider;
use crate::language::Language;
use crate::llm::LanguageModel;
use crate::models::{Category, ChatTurn};
use crate::vector_index::VectorIndex;

/// Categorization fallback keyword sets.
const TRANSACTIONAL_KEYWORDS: [&str; 6] =
    ["password", "login", "account", "payment", "refund", "order"];
const TECH_KEYWORDS: [&str; 6] = ["crash", "error", "bug", "not working", "slow", "problem"];

/// Phrases that signal the model could not answer from the context.
const UNCERTAINTY_EN: [&str; 4] = ["cannot find", "not sure", "unclear", "apologize"];
const UNCERTAINTY_AR: [&str; 4] = ["لا أستطيع", "غير متأكد", "أعتذر", "غير واضح"];

const FALLBACK_EN: &str = "I apologize, but I'm having trouble processing your request right now. \
     Please try again or contact our human support team for assistance.";
const FALLBACK_AR: &str = "أعتذر، لكنني أواجه صعوبة في معالجة طلبك الآن. يرجى المحاولة مرة أخرى \
     أو الاتصال بفريق الدعم البشري للحصول على المساعدة.";

#[derive(Debug, Clone, Copy)]
struct CategoryOutcome {
    category: Category,
    confidence: f32,
}

#[derive(Debug, Clone)]
struct GenerationOutcome {
    response: String,
    confidence: f32,
}

pub struct SupportAgent {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorIndex>,
    model: Arc<dyn LanguageModel>,
    top_k: usize,
    temperature: f32,
    timeout: Duration,
}

impl SupportAgent {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        top_k: usize,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            vectors,
            model,
            top_k,
            temperature,
            timeout,
        }
    }

    /// Answer one chat message. Infallible by contract: every failure
    /// degrades to a lower-confidence, localized response.
    pub async fn process_chat(
        &self,
        message: &str,
        language: Language,
        _user_id: Option<&str>,
        _session_id: Option<&str>,
    ) -> ChatTurn {
        let category = self.categorize(message, language).await;
        let context = self.retrieve(message).await;
        let generation = self
            .generate(message, &context, language, category.category)
            .await;

        let confidence = fuse(category.confidence, generation.confidence);

        ChatTurn {
            message: message.to_string(),
            response: generation.response,
            language,
            category: category.category,
            confidence,
            resolved: ChatTurn::is_resolved(confidence),
        }
    }

    async fn categorize(&self, query: &str, language: Language) -> CategoryOutcome {
        let prompt = category_prompt(language, query);
        match self.model.classify(&prompt).await {
            Ok(text) if !text.trim().is_empty() => parse_category_response(&text)
                .unwrap_or_else(|| keyword_category(query)),
            Ok(_) => CategoryOutcome {
                category: Category::Unknown,
                confidence: 0.3,
            },
            Err(e) => {
                eprintln!("Warning: query categorization failed: {}", e);
                CategoryOutcome {
                    category: Category::Unknown,
                    confidence: 0.2,
                }
            }
        }
    }

    async fn retrieve(&self, query: &str) -> Vec<String> {
        let embedding = self.embedder.embed(query).await;
        match self.vectors.query(&embedding, self.top_k).await {
            Ok(results) => results
                .into_iter()
                .map(|r| r.text)
                .filter(|t| !t.is_empty())
                .collect(),
            Err(e) => {
                eprintln!("Warning: context retrieval failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn generate(
        &self,
        query: &str,
        context: &[String],
        language: Language,
        category: Category,
    ) -> GenerationOutcome {
        let system = system_prompt(language, category, context);
        let user = user_prompt(language, query);

        let call = self.model.generate(&system, &user, self.temperature);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                let mut confidence: f32 = if context.is_empty() { 0.3 } else { 0.8 };
                let lowered = text.to_lowercase();
                if uncertainty_phrases(language)
                    .iter()
                    .any(|phrase| lowered.contains(phrase))
                {
                    confidence = confidence.min(0.4);
                }
                GenerationOutcome {
                    response: text,
                    confidence,
                }
            }
            Ok(Ok(_)) => GenerationOutcome {
                response: fallback_response(language).to_string(),
                confidence: 0.2,
            },
            Ok(Err(e)) => {
                eprintln!("Warning: response generation failed: {}", e);
                GenerationOutcome {
                    response: fallback_response(language).to_string(),
                    confidence: 0.1,
                }
            }
            Err(_) => {
                eprintln!("Warning: response generation timed out");
                GenerationOutcome {
                    response: fallback_response(language).to_string(),
                    confidence: 0.1,
                }
            }
        }
    }
}

/// Final confidence is the weaker of the two stage confidences.
pub fn fuse(category_confidence: f32, response_confidence: f32) -> f32 {
    category_confidence.min(response_confidence)
}

/// Localized apology used whenever generation cannot produce an answer.
pub fn fallback_response(language: Language) -> &'static str {
    match language {
        Language::En => FALLBACK_EN,
        Language::Ar => FALLBACK_AR,
    }
}

fn uncertainty_phrases(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => &UNCERTAINTY_EN,
        Language::Ar => &UNCERTAINTY_AR,
    }
}

fn category_prompt(language: Language, query: &str) -> String {
    match language {
        Language::En => format!(
            "Classify the following customer support query into one of these categories:\n\
             - Product FAQ: Questions about product features, specifications, usage\n\
             - Tech issue: Technical problems, bugs, troubleshooting\n\
             - Transactional: Orders, payments, refunds, account issues\n\n\
             Respond with JSON in this format: {{\"category\": \"category_name\", \"confidence\": float_between_0_and_1}}\n\n\
             Query: {}",
            query
        ),
        Language::Ar => format!(
            "صنف استفسار دعم العملاء التالي إلى إحدى هذه الفئات:\n\
             - Product FAQ: أسئلة حول ميزات المنتج والمواصفات والاستخدام\n\
             - Tech issue: مشاكل تقنية وأخطاء واستكشاف الأخطاء وإصلاحها\n\
             - Transactional: طلبات ومدفوعات واسترداد ومشاكل الحساب\n\n\
             أجب بصيغة JSON: {{\"category\": \"category_name\", \"confidence\": float_between_0_and_1}}\n\n\
             الاستفسار: {}",
            query
        ),
    }
}

fn system_prompt(language: Language, category: Category, context: &[String]) -> String {
    let context_text = if context.is_empty() {
        match language {
            Language::En => "No relevant context found.".to_string(),
            Language::Ar => "لم يتم العثور على سياق ذي صلة.".to_string(),
        }
    } else {
        context.join("\n\n")
    };

    match language {
        Language::En => format!(
            "You are an intelligent customer support assistant. Use ONLY the provided information to answer the customer's query.\n\
             Query category: {}\n\n\
             Important rules:\n\
             1. Use only the information provided in the context\n\
             2. If you cannot find an answer in the context, say \"I apologize, but I cannot find specific information about this topic\"\n\
             3. Be helpful and polite\n\
             4. Provide clear and detailed answers\n\n\
             Available context:\n{}",
            category, context_text
        ),
        Language::Ar => format!(
            "أنت مساعد دعم عملاء ذكي. استخدم المعلومات المقدمة فقط للإجابة على استفسار العميل.\n\
             فئة الاستفسار: {}\n\n\
             قواعد مهمة:\n\
             1. استخدم فقط المعلومات المقدمة في السياق\n\
             2. إذا لم تجد إجابة في السياق، قل \"أعتذر، لا أستطيع العثور على معلومات محددة حول هذا الموضوع\"\n\
             3. كن مفيداً ومهذباً\n\
             4. قدم إجابات واضحة ومفصلة\n\n\
             السياق المتاح:\n{}",
            category, context_text
        ),
    }
}

fn user_prompt(language: Language, query: &str) -> String {
    match language {
        Language::En => format!("Customer query: {}", query),
        Language::Ar => format!("استفسار العميل: {}", query),
    }
}

/// Recover a JSON object from free-form model output: take the span from
/// the first `{` to the last `}` and try to parse it. Returns `None` when
/// no parseable object exists, letting the caller fall through to the
/// keyword heuristics.
fn parse_category_response(text: &str) -> Option<CategoryOutcome> {
    let json_text = extract_json_object(text)?;
    let value: serde_json::Value = serde_json::from_str(json_text).ok()?;

    let category = value
        .get("category")
        .and_then(|c| c.as_str())
        .map(Category::from_label)
        .unwrap_or(Category::Unknown);
    let confidence = value
        .get("confidence")
        .and_then(|c| c.as_f64())
        .unwrap_or(0.5) as f32;

    Some(CategoryOutcome {
        category,
        confidence: confidence.clamp(0.0, 1.0),
    })
}

/// Locate the first `{` and the last `}` in `text`.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Keyword-matching fallback when structured categorization output is
/// malformed.
fn keyword_category(query: &str) -> CategoryOutcome {
    let lowered = query.to_lowercase();
    if TRANSACTIONAL_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        CategoryOutcome {
            category: Category::Transactional,
            confidence: 0.7,
        }
    } else if TECH_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        CategoryOutcome {
            category: Category::TechIssue,
            confidence: 0.7,
        }
    } else {
        CategoryOutcome {
            category: Category::ProductFaq,
            confidence: 0.6,
        }
    }
}
