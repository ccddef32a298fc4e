//! Login form auto-fill.
//!
//! Field lookup is data: each field has an ordered chain of matchers and the
//! first one that yields an element wins. The chain is serialized into the
//! script, so tuning the heuristics never touches JavaScript.

use serde::Serialize;

use crate::config::{SlotCredentials, SpaConfig};
use crate::rewrite::scripts::embed_json;

const PLAN_PLACEHOLDER: &str = "__AUTOFILL_PLAN__";

/// One way of locating a form control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldMatcher {
    /// Exact CSS selector.
    Selector(String),
    /// Case-insensitive regex tested against placeholder / aria-label.
    Placeholder(String),
    /// Selector that must match exactly one element.
    SoleCandidate(String),
}

impl FieldMatcher {
    fn selector(s: &str) -> Self {
        FieldMatcher::Selector(s.to_string())
    }

    fn placeholder(s: &str) -> Self {
        FieldMatcher::Placeholder(s.to_string())
    }

    fn sole(s: &str) -> Self {
        FieldMatcher::SoleCandidate(s.to_string())
    }
}

/// Default chain for the login identifier field.
pub fn email_matchers() -> Vec<FieldMatcher> {
    vec![
        FieldMatcher::selector(r#"input[type="email"]"#),
        FieldMatcher::selector(r#"input[name="email"]"#),
        FieldMatcher::selector(r#"input[autocomplete="username"]"#),
        FieldMatcher::placeholder(r"e-?mail|user(name)?|login"),
        FieldMatcher::sole(r#"input[type="text"]"#),
    ]
}

pub fn password_matchers() -> Vec<FieldMatcher> {
    vec![
        FieldMatcher::selector(r#"input[name="password"]"#),
        FieldMatcher::selector(r#"input[autocomplete="current-password"]"#),
        FieldMatcher::placeholder(r"pass(word)?|senha|contrase"),
        FieldMatcher::sole(r#"input[type="password"]"#),
    ]
}

/// Controls clicked when the fields are not inside a form.
pub fn submit_matchers() -> Vec<FieldMatcher> {
    vec![
        FieldMatcher::selector(r#"button[type="submit"]"#),
        FieldMatcher::selector(r#"input[type="submit"]"#),
        FieldMatcher::sole("button"),
    ]
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Everything the auto-fill script needs for one slot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofillPlan<'a> {
    email: Vec<FieldMatcher>,
    password: Vec<FieldMatcher>,
    submit: Vec<FieldMatcher>,
    max_attempts: u32,
    interval_ms: u64,
    credentials: PlanCredentials<'a>,
}

impl<'a> AutofillPlan<'a> {
    pub fn new(credentials: &'a SlotCredentials, spa: &SpaConfig) -> Self {
        Self {
            email: email_matchers(),
            password: password_matchers(),
            submit: submit_matchers(),
            max_attempts: spa.autofill_max_attempts,
            interval_ms: spa.autofill_interval_ms,
            credentials: PlanCredentials {
                email: &credentials.email,
                password: &credentials.password,
            },
        }
    }

    pub fn render(&self) -> Result<String, serde_json::Error> {
        let plan = embed_json(self)?;
        Ok(format!(
            "<script data-gateway=\"autofill\">{}</script>",
            AUTOFILL_SCRIPT.replace(PLAN_PLACEHOLDER, &plan)
        ))
    }
}

const AUTOFILL_SCRIPT: &str = r##"(function (P) {
  function find(chain) {
    for (var i = 0; i < chain.length; i++) {
      var m = chain[i], found = null;
      try {
        if (m.kind === "selector") {
          found = document.querySelector(m.value);
        } else if (m.kind === "placeholder") {
          var re = new RegExp(m.value, "i");
          var inputs = document.querySelectorAll("input");
          for (var j = 0; j < inputs.length && !found; j++) {
            var hint = inputs[j].getAttribute("placeholder") || inputs[j].getAttribute("aria-label") || "";
            if (re.test(hint)) found = inputs[j];
          }
        } else if (m.kind === "sole_candidate") {
          var list = document.querySelectorAll(m.value);
          if (list.length === 1) found = list[0];
        }
      } catch (e) {}
      if (found) return found;
    }
    return null;
  }
  function fill(el, value) {
    var desc = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, "value");
    if (desc && desc.set) desc.set.call(el, value);
    else el.value = value;
    el.dispatchEvent(new Event("input", { bubbles: true }));
    el.dispatchEvent(new Event("change", { bubbles: true }));
  }
  function submit(from) {
    var form = from.form || (from.closest && from.closest("form"));
    if (form) {
      if (form.requestSubmit) form.requestSubmit();
      else form.submit();
      return;
    }
    var control = find(P.submit);
    if (control) control.click();
  }
  var attempts = 0;
  var timer = setInterval(function () {
    attempts += 1;
    if (attempts > P.maxAttempts) { clearInterval(timer); return; }
    var email = find(P.email);
    var password = find(P.password);
    if (!email || !password || email === password) return;
    if (!email.value) fill(email, P.credentials.email);
    if (!password.value) fill(password, P.credentials.password);
    if (email.value && password.value) {
      clearInterval(timer);
      submit(password);
    }
  }, P.intervalMs);
})(__AUTOFILL_PLAN__);"##;
