// JSON:API error documents and the rule → code table
use axum::http::{Method, StatusCode};
use rand::Rng;
use serde::Serialize;

use crate::error::ApiError;

macro_rules! rule_table {
    ($($variant:ident => $name:literal, $code:literal;)+) => {
        /// Validation rule kinds with their stable error codes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Rule {
            $($variant,)+
        }

        impl Rule {
            pub const ALL: &'static [Rule] = &[$(Rule::$variant,)+];

            /// Lowercase snake_case rule name
            pub fn name(&self) -> &'static str {
                match self {
                    $(Rule::$variant => $name,)+
                }
            }

            pub fn code(&self) -> &'static str {
                match self {
                    $(Rule::$variant => $code,)+
                }
            }
        }
    };
}

rule_table! {
    Accepted => "accepted", "001";
    ActiveUrl => "active_url", "002";
    After => "after", "003";
    AfterOrEqual => "after_or_equal", "004";
    Alpha => "alpha", "005";
    AlphaDash => "alpha_dash", "006";
    AlphaNum => "alpha_num", "007";
    Array => "array", "008";
    Before => "before", "009";
    BeforeOrEqual => "before_or_equal", "010";
    Between => "between", "011";
    Boolean => "boolean", "012";
    Confirmed => "confirmed", "013";
    Date => "date", "014";
    DateEquals => "date_equals", "015";
    DateFormat => "date_format", "016";
    Different => "different", "017";
    Digits => "digits", "018";
    DigitsBetween => "digits_between", "019";
    Dimensions => "dimensions", "020";
    Distinct => "distinct", "021";
    Email => "email", "022";
    EndsWith => "ends_with", "023";
    Exists => "exists", "024";
    File => "file", "025";
    Filled => "filled", "026";
    Gt => "gt", "027";
    Gte => "gte", "028";
    Image => "image", "029";
    In => "in", "030";
    InArray => "in_array", "031";
    Integer => "integer", "032";
    Ip => "ip", "033";
    Ipv4 => "ipv4", "034";
    Ipv6 => "ipv6", "035";
    Json => "json", "036";
    Lt => "lt", "037";
    Lte => "lte", "038";
    Max => "max", "039";
    Mimes => "mimes", "040";
    Mimetypes => "mimetypes", "041";
    Min => "min", "042";
    MultipleOf => "multiple_of", "043";
    NotIn => "not_in", "044";
    NotRegex => "not_regex", "045";
    Numeric => "numeric", "046";
    Password => "password", "047";
    Present => "present", "048";
    Regex => "regex", "049";
    Required => "required", "050";
    RequiredIf => "required_if", "051";
    RequiredUnless => "required_unless", "052";
    RequiredWith => "required_with", "053";
    RequiredWithAll => "required_with_all", "054";
    RequiredWithout => "required_without", "055";
    RequiredWithoutAll => "required_without_all", "056";
    Same => "same", "057";
    Size => "size", "058";
    StartsWith => "starts_with", "059";
    String => "string", "060";
    Timezone => "timezone", "061";
    Unique => "unique", "062";
    Uploaded => "uploaded", "063";
    Url => "url", "064";
    Uuid => "uuid", "065";
    LoginInvalid => "login_invalid", "100";
    RegisterInvalid => "register_invalid", "101";
    SaveInvalid => "save_invalid", "102";
    UpdateInvalid => "update_invalid", "103";
    DeleteInvalid => "delete_invalid", "104";
    FilteringInvalid => "filtering_invalid", "105";
    UploadInvalid => "upload_invalid", "106";
    RegisterAlloInvalid => "register_allo_invalid", "200";
    LoginAlloInvalid => "login_allo_invalid", "201";
    ScanInvalid => "scan_invalid", "202";
}

/// Code returned for rule names outside the table
pub const FALLBACK_CODE: &str = "400";

impl Rule {
    pub fn from_name(name: &str) -> Option<Rule> {
        let normalized = crate::resource::snake_case(name).to_ascii_lowercase();
        Rule::ALL.iter().copied().find(|r| r.name() == normalized)
    }

    /// Title shown in error objects: the rule name with spaces
    pub fn title(&self) -> String {
        self.name().replace('_', " ")
    }

    /// Default English message; placeholders are `:attribute` plus rule parameters
    pub fn message_template(&self) -> &'static str {
        match self {
            Rule::Accepted => "The :attribute must be accepted.",
            Rule::Array => "The :attribute must be an array.",
            Rule::Between => "The :attribute must be between :min and :max characters.",
            Rule::Date => "The :attribute is not a valid date.",
            Rule::DateFormat => "The :attribute does not match the format :format.",
            Rule::Different => "The :attribute and :other must be different.",
            Rule::Email => "The :attribute must be a valid email address.",
            Rule::Exists | Rule::In => "The selected :attribute is invalid.",
            Rule::Filled => "The :attribute field must have a value.",
            Rule::Gt => "The :attribute must be greater than :value.",
            Rule::Integer => "The :attribute must be an integer.",
            Rule::Max => "The :attribute may not be greater than :max characters.",
            Rule::Min => "The :attribute must be at least :min characters.",
            Rule::Numeric => "The :attribute must be a number.",
            Rule::Required => "The :attribute field is required.",
            Rule::RequiredWith => "The :attribute field is required when :values is present.",
            Rule::Same => "The :attribute and :other must match.",
            Rule::String => "The :attribute must be a string.",
            Rule::Unique => "The :attribute has already been taken.",
            Rule::Uuid => "The :attribute must be a valid UUID.",
            _ => "The :attribute is invalid.",
        }
    }
}

/// Code for a rule given by name; unknown names map to `"400"`
pub fn rule_code(name: &str) -> &'static str {
    Rule::from_name(name).map(|r| r.code()).unwrap_or(FALLBACK_CODE)
}

/// Substitute `:attribute` and named parameters into a message template
pub fn make_replacements(template: &str, attribute: &str, params: &[(&str, String)]) -> String {
    let mut message = template.replace(":attribute", &attribute.replace('_', " "));
    for (key, value) in params {
        message = message.replace(&format!(":{}", key), value);
    }
    message
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Pointer(String),
    Parameter(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorObject {
    pub id: u16,
    pub status: String,
    pub code: String,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

impl ErrorObject {
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: random_error_id(),
            status: status.as_u16().to_string(),
            code: code.into(),
            title: title.into(),
            detail: detail.into(),
            source: None,
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.source = Some(ErrorSource::Parameter(parameter.into()));
        self
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.source = Some(ErrorSource::Pointer(pointer.into()));
        self
    }
}

fn random_error_id() -> u16 {
    rand::thread_rng().gen_range(1000..=9999)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
    pub fn single(error: ErrorObject) -> Self {
        Self { errors: vec![error] }
    }

    pub fn push(&mut self, error: ErrorObject) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Method and path of the request being validated. Decides the shape of
/// error `source` members.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into() }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    fn is_auth_path(&self) -> bool {
        self.path.split('/').any(|segment| segment == "auth")
    }

    pub fn source_for(&self, attribute: &str) -> ErrorSource {
        if self.method == Method::GET || self.method == Method::DELETE {
            ErrorSource::Parameter(attribute.replace('.', "/"))
        } else if self.is_auth_path() {
            ErrorSource::Pointer(attribute.to_string())
        } else if attribute == "id" {
            ErrorSource::Pointer(format!("/data/{}", attribute))
        } else {
            ErrorSource::Pointer(format!("/data/attributes/{}", attribute))
        }
    }
}

/// Accumulates rule failures of one validation pass into a single document
#[derive(Debug)]
pub struct ValidationErrors<'a> {
    context: &'a RequestContext,
    status: StatusCode,
    document: ErrorDocument,
}

impl<'a> ValidationErrors<'a> {
    pub fn new(context: &'a RequestContext, status: StatusCode) -> Self {
        Self { context, status, document: ErrorDocument::default() }
    }

    pub fn context(&self) -> &RequestContext {
        self.context
    }

    /// Record a failed rule for `attribute`
    pub fn add_failure(&mut self, attribute: &str, rule: Rule, params: &[(&str, String)]) {
        let detail = make_replacements(rule.message_template(), attribute, params);
        self.add_failure_message(attribute, rule, detail);
    }

    /// Record a failed rule with a caller supplied message
    pub fn add_failure_message(&mut self, attribute: &str, rule: Rule, detail: impl Into<String>) {
        let mut error = ErrorObject::new(self.status, rule.code(), rule.title(), detail);
        error.source = Some(self.context.source_for(attribute));
        self.document.push(error);
    }

    pub fn push(&mut self, error: ErrorObject) {
        self.document.push(error);
    }

    pub fn has_failures(&self) -> bool {
        !self.document.is_empty()
    }

    pub fn has_failure_for(&self, attribute: &str) -> bool {
        let source = self.context.source_for(attribute);
        self.document.errors.iter().any(|e| e.source.as_ref() == Some(&source))
    }

    /// Finalize: `Err` carrying every collected failure, `Ok` when none
    pub fn finish(self) -> Result<(), ApiError> {
        if self.document.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.status, self.document))
        }
    }
}
