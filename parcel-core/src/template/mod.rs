//! Chat templates a run configuration can name, and a text renderer that
//! lays a conversation out the way the training framework will see it.

use serde::{Deserialize, Serialize};

use crate::error::{ParcelError, Result};

pub mod registry;
pub mod tools;

pub use registry::{get, names};
pub use tools::format_tools;

/// One piece of a formatter. Text slots may contain `{{content}}`,
/// `{{idx}}`, `{{name}}` and `{{arguments}}` placeholders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Slot {
    Text(&'static str),
    Bos,
    Eos,
    /// A literal special token.
    Token(&'static str),
}

const CONTENT: &[Slot] = &[Slot::Text("{{content}}")];
const CONTENT_EOS: &[Slot] = &[Slot::Text("{{content}}"), Slot::Eos];
const FUNCTION: &[Slot] = &[Slot::Text("Action: {{name}}\nAction Input: {{arguments}}")];
const FUNCTION_EOS: &[Slot] = &[
    Slot::Text("Action: {{name}}\nAction Input: {{arguments}}"),
    Slot::Eos,
];

#[derive(Clone, Debug, Serialize)]
pub struct Template {
    pub name: &'static str,
    pub user: &'static [Slot],
    /// `None`: `{{content}}` followed by EOS unless `efficient_eos`.
    pub assistant: Option<&'static [Slot]>,
    /// `None`: `{{content}}`.
    pub system: Option<&'static [Slot]>,
    /// `None`: same as `user`.
    pub observation: Option<&'static [Slot]>,
    /// `None`: ReAct style `Action:` / `Action Input:` lines.
    pub function: Option<&'static [Slot]>,
    pub separator: &'static [Slot],
    pub default_system: &'static str,
    pub stop_words: &'static [&'static str],
    pub efficient_eos: bool,
    pub replace_eos: bool,
    pub force_system: bool,
    /// llama2 family: the system block is prepended to the first user turn
    /// inside the user formatter.
    pub system_in_user: bool,
}

impl Template {
    pub(crate) const fn base(name: &'static str, user: &'static [Slot]) -> Self {
        Self {
            name,
            user,
            assistant: None,
            system: None,
            observation: None,
            function: None,
            separator: &[],
            default_system: "",
            stop_words: &[],
            efficient_eos: false,
            replace_eos: false,
            force_system: false,
            system_in_user: false,
        }
    }

    fn assistant_slots(&self) -> &'static [Slot] {
        match (self.assistant, self.efficient_eos) {
            (Some(s), _) => s,
            (None, true) => CONTENT,
            (None, false) => CONTENT_EOS,
        }
    }

    fn function_slots(&self) -> &'static [Slot] {
        match (self.function, self.efficient_eos) {
            (Some(s), _) => s,
            (None, true) => FUNCTION,
            (None, false) => FUNCTION_EOS,
        }
    }

    /// EOS token after applying `replace_eos`: the first stop word takes over.
    pub fn eos_override(&self) -> Result<Option<&'static str>> {
        if !self.replace_eos {
            return Ok(None);
        }
        self.stop_words.first().copied().map(Some).ok_or_else(|| {
            ParcelError::Config(format!(
                "template {}: stop words are required to replace the EOS token",
                self.name
            ))
        })
    }

    /// Stop words left once one of them has become the EOS token.
    pub fn effective_stop_words(&self) -> Result<&'static [&'static str]> {
        Ok(match self.eos_override()? {
            Some(_) => &self.stop_words[1..],
            None => self.stop_words,
        })
    }

    pub fn effective_tokens(&self, base: &SpecialTokens) -> Result<SpecialTokens> {
        let mut t = base.clone();
        if let Some(eos) = self.eos_override()? {
            t.eos = eos.to_string();
        }
        Ok(t)
    }

    /// Render `messages` as `(prompt, response)` text pairs.
    ///
    /// Messages alternate prompt side (user/observation) and response side
    /// (assistant/function), starting with the prompt side. The first turn
    /// carries the system text when there is one or when the template forces
    /// it; later prompt turns are preceded by the separator. `tools` is a
    /// JSON list of tool declarations whose description follows the system
    /// text.
    pub fn render(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: Option<&str>,
        tokens: &SpecialTokens,
    ) -> Result<Vec<(String, String)>> {
        if messages.is_empty() || messages.len() % 2 != 0 {
            return Err(ParcelError::Format(format!(
                "expected an even, non-zero number of messages, got {}",
                messages.len()
            )));
        }
        let tokens = self.effective_tokens(tokens)?;
        let system = system.filter(|s| !s.is_empty()).unwrap_or(self.default_system);
        let tools = tools.filter(|t| !t.is_empty());

        let mut rendered = Vec::with_capacity(messages.len());
        for (i, m) in messages.iter().enumerate() {
            let prompt_side = i % 2 == 0;
            if prompt_side != m.role.is_prompt_side() {
                return Err(ParcelError::Format(format!(
                    "message {i} has role {:?} out of turn",
                    m.role
                )));
            }

            let mut out = String::new();
            let mut system_text = String::new();
            if i == 0 && (!system.is_empty() || tools.is_some() || self.force_system) {
                let tool_text = match tools {
                    Some(t) => format_tools(t)?,
                    None => String::new(),
                };
                let content = format!("{system}{tool_text}");
                let vars = Vars::content(&content);
                let slots = self.system.unwrap_or(CONTENT);
                if self.system_in_user {
                    system_text = apply(slots, &vars, &tokens);
                } else {
                    out.push_str(&apply(slots, &vars, &tokens));
                }
            } else if i > 0 && prompt_side {
                out.push_str(&apply(self.separator, &Vars::default(), &tokens));
            }

            let idx = (i / 2).to_string();
            match m.role {
                Role::User => {
                    let content = format!("{system_text}{}", m.content);
                    let vars = Vars {
                        content: &content,
                        idx: &idx,
                        ..Default::default()
                    };
                    out.push_str(&apply(self.user, &vars, &tokens));
                }
                Role::Observation => {
                    let slots = self.observation.unwrap_or(self.user);
                    let vars = Vars {
                        content: &m.content,
                        idx: &idx,
                        ..Default::default()
                    };
                    out.push_str(&apply(slots, &vars, &tokens));
                }
                Role::Assistant => {
                    out.push_str(&apply(self.assistant_slots(), &Vars::content(&m.content), &tokens));
                }
                Role::Function => {
                    let call: FunctionCall = serde_json::from_str(&m.content)?;
                    let arguments = serde_json::to_string(&call.arguments)?;
                    let vars = Vars {
                        name: &call.name,
                        arguments: &arguments,
                        ..Default::default()
                    };
                    out.push_str(&apply(self.function_slots(), &vars, &tokens));
                }
            }
            rendered.push(out);
        }

        let mut pairs = Vec::with_capacity(rendered.len() / 2);
        let mut it = rendered.into_iter();
        while let (Some(p), Some(r)) = (it.next(), it.next()) {
            pairs.push((p, r));
        }
        Ok(pairs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    pub bos: String,
    pub eos: String,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            bos: "<s>".into(),
            eos: "</s>".into(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Observation,
    Function,
}

impl Role {
    fn is_prompt_side(self) -> bool {
        matches!(self, Role::User | Role::Observation)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A conversation file: optional system prompt and tool list plus
/// alternating messages.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub system: Option<String>,
    /// Either a JSON list or a string holding one.
    #[serde(default)]
    pub tools: Option<serde_json::Value>,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Tool list as JSON text, ready for [`Template::render`].
    pub fn tools_json(&self) -> Option<String> {
        self.tools.as_ref().map(|t| match t {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Default)]
struct Vars<'a> {
    content: &'a str,
    idx: &'a str,
    name: &'a str,
    arguments: &'a str,
}

impl<'a> Vars<'a> {
    fn content(content: &'a str) -> Self {
        Self {
            content,
            ..Default::default()
        }
    }
}

fn apply(slots: &[Slot], vars: &Vars<'_>, tokens: &SpecialTokens) -> String {
    let mut out = String::new();
    for slot in slots {
        match slot {
            Slot::Text(t) => out.push_str(
                &t.replace("{{content}}", vars.content)
                    .replace("{{idx}}", vars.idx)
                    .replace("{{name}}", vars.name)
                    .replace("{{arguments}}", vars.arguments),
            ),
            Slot::Bos => out.push_str(&tokens.bos),
            Slot::Eos => out.push_str(&tokens.eos),
            Slot::Token(t) => out.push_str(t),
        }
    }
    out
}
