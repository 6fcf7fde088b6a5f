//! Static responder — canned replies that never reach the model.
//!
//! Three trigger groups are checked in a fixed order against the
//! lower-cased message: identity, meta-topic, casual. The first group
//! with a trigger contained anywhere in the message answers. Matching is
//! plain substring containment.

// Literals, so the redirects below can `concat!` them.
macro_rules! meta_practice {
    () => {
        "Choose the correct sentence: (a) He don't like apples. (b) He doesn't like apples."
    };
}

macro_rules! casual_practice {
    () => {
        "Fill in the blank: \"I ___ (eat) breakfast at seven o'clock every morning.\""
    };
}

/// Practice question attached to the meta-topic redirect.
pub const META_PRACTICE: &str = meta_practice!();

/// Practice question attached to the casual-greeting redirect.
pub const CASUAL_PRACTICE: &str = casual_practice!();

/// One rule group: any trigger fires the response.
#[derive(Debug, Clone, Copy)]
pub struct StaticRule {
    pub name: &'static str,
    pub triggers: &'static [&'static str],
    pub response: &'static str,
}

impl StaticRule {
    /// Whether any trigger occurs in `lowered`, which must already be lower case.
    pub fn matches(&self, lowered: &str) -> bool {
        self.triggers.iter().any(|t| lowered.contains(t))
    }
}

pub const IDENTITY: StaticRule = StaticRule {
    name: "identity",
    triggers: &[
        "who created",
        "who made you",
        "developer",
        "programmer",
        "who built you",
        "creator",
        "who coded",
    ],
    response: "I was created by a group of PTK students 🌸 This project was built for the Open House.",
};

pub const META_TOPIC: StaticRule = StaticRule {
    name: "meta_topic",
    triggers: &[
        "what model are you",
        "which model",
        "what ai are you",
        "language model",
        "openai",
        "chatgpt",
        "gpt-",
        "llama",
        "groq",
        "your system prompt",
    ],
    response: concat!(
        "Let's keep our focus on learning English together! 📚\n\nTry this one: ",
        meta_practice!()
    ),
};

pub const CASUAL: StaticRule = StaticRule {
    name: "casual",
    triggers: &["hi", "hello", "hey", "haha", "hehe", "lol", "good morning", "good afternoon"],
    response: concat!(
        "Hello there! 😊 I'm happy to see you. Let's practice a little English!\n\n",
        casual_practice!()
    ),
};

/// Rule groups in priority order.
pub const RULES: [StaticRule; 3] = [IDENTITY, META_TOPIC, CASUAL];

/// Return the canned reply for `message`, if any rule fires.
pub fn check(message: &str) -> Option<&'static str> {
    check_rule(message).map(|rule| rule.response)
}

/// Like [`check`] but returns the rule, for logging.
pub fn check_rule(message: &str) -> Option<&'static StaticRule> {
    let lowered = message.to_lowercase();
    RULES.iter().find(|rule| rule.matches(&lowered))
}
