//! Schema document → [`EndpointDescriptor`] extraction.
//!
//! Extraction is best-effort on field values (missing names, types and descriptions get
//! defaults) but strict on structure: an operation without a usable success response or with a
//! request-body schema of an unknown shape aborts the whole load.

use crate::config::{HashPolicy, SchemaSourceConfig};
use crate::descriptor::{EndpointDescriptor, ParamLocation, ParameterDescriptor, strip_tenant_prefix};
use crate::error::{OpenApiToolsError, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const HTTP_VERBS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Load, verify and parse the schema document, then extract every operation.
///
/// # Errors
///
/// Returns a load error if the file cannot be read, fails hash verification under
/// [`HashPolicy::Fail`], or is neither valid JSON nor valid YAML. Returns a schema error if any
/// operation has an unexpected shape (see [`extract_descriptors`]).
pub fn load_descriptors(config: &SchemaSourceConfig) -> Result<Vec<EndpointDescriptor>> {
    tracing::info!("Loading OpenAPI schema from {}", config.path);
    let content =
        std::fs::read_to_string(&config.path).map_err(|e| OpenApiToolsError::SchemaRead {
            path: config.path.clone(),
            source: e,
        })?;

    verify_hash(config, &content)?;

    let document = parse_document(&config.path, &content)?;
    let descriptors = extract_descriptors(&document)?;

    tracing::info!(
        "Extracted {} endpoint descriptors from '{}'",
        descriptors.len(),
        config.path
    );
    Ok(descriptors)
}

fn verify_hash(config: &SchemaSourceConfig, content: &str) -> Result<()> {
    let Some(expected_hash) = &config.sha256 else {
        return Ok(());
    };

    let actual_hash = format!("sha256:{}", hex::encode(Sha256::digest(content.as_bytes())));
    if actual_hash == *expected_hash {
        return Ok(());
    }

    match config.hash_policy {
        HashPolicy::Fail => Err(OpenApiToolsError::SchemaHashMismatch {
            location: config.path.clone(),
            expected: expected_hash.clone(),
            actual: actual_hash,
        }),
        HashPolicy::Warn => {
            tracing::warn!(
                "Schema hash mismatch for '{}'. Expected: {}, Got: {}",
                config.path,
                expected_hash,
                actual_hash
            );
            Ok(())
        }
        HashPolicy::Ignore => Ok(()),
    }
}

/// Parse a schema document. JSON is tried first; anything else is read as YAML.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::SchemaParse`] if the content is neither.
pub fn parse_document(location: &str, content: &str) -> Result<Value> {
    if content.trim_start().starts_with('{') {
        return serde_json::from_str(content).map_err(|e| OpenApiToolsError::SchemaParse {
            location: location.to_string(),
            message: e.to_string(),
        });
    }

    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| OpenApiToolsError::SchemaParse {
            location: location.to_string(),
            message: e.to_string(),
        })?;
    Ok(yaml_to_json(yaml))
}

// YAML allows non-string keys (`200:` unquoted); JSON objects need strings.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key_to_string(k), yaml_to_json(v)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Extract one descriptor per (route, verb), in document order.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::InvalidDocument`] if `paths` is missing, and
/// [`OpenApiToolsError::InvalidOperation`] for the first operation that has no 2xx/3xx
/// response, an unusable request body, or a malformed parameter list.
pub fn extract_descriptors(document: &Value) -> Result<Vec<EndpointDescriptor>> {
    let paths = document
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| OpenApiToolsError::InvalidDocument("missing `paths` object".into()))?;

    let empty = Map::new();
    let components = document
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut descriptors = Vec::new();
    for (route, path_item) in paths {
        let path_item = path_item.as_object().ok_or_else(|| {
            OpenApiToolsError::InvalidDocument(format!("path item '{route}' is not an object"))
        })?;

        for (verb, operation) in path_item {
            let method = verb.to_ascii_lowercase();
            if !HTTP_VERBS.contains(&method.as_str()) {
                tracing::debug!(route = %route, key = %verb, "skipping non-operation path item key");
                continue;
            }

            let input = OperationInput {
                route,
                method: &method,
                operation,
                components,
            };
            descriptors.push(input.descriptor()?);
        }
    }

    Ok(descriptors)
}

struct OperationInput<'a> {
    route: &'a str,
    method: &'a str,
    operation: &'a Value,
    components: &'a Map<String, Value>,
}

impl OperationInput<'_> {
    fn invalid(&self, message: impl Into<String>) -> OpenApiToolsError {
        OpenApiToolsError::InvalidOperation {
            method: self.method.to_uppercase(),
            route: self.route.to_string(),
            message: message.into(),
        }
    }

    fn descriptor(&self) -> Result<EndpointDescriptor> {
        if !self.operation.is_object() {
            return Err(self.invalid("operation is not an object"));
        }

        let summary = self
            .operation
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(EndpointDescriptor {
            route: strip_tenant_prefix(self.route),
            method: self.method.to_string(),
            summary,
            response_description: self.response_description()?,
            request_fields: self.request_fields()?,
            parameters: self.parameters()?,
        })
    }

    fn response_description(&self) -> Result<String> {
        let responses = self
            .operation
            .get("responses")
            .and_then(Value::as_object)
            .ok_or_else(|| self.invalid("missing `responses` object"))?;

        let response = select_success_response(responses)
            .ok_or_else(|| self.invalid("no 2xx or 3xx response declared"))?;

        response
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.invalid("success response has no description"))
    }

    fn request_fields(&self) -> Result<Option<Map<String, Value>>> {
        let Some(body) = self.operation.get("requestBody") else {
            return Ok(None);
        };
        if body.is_null() || body.as_object().is_some_and(Map::is_empty) {
            return Ok(None);
        }

        let content = body
            .get("content")
            .and_then(Value::as_object)
            .ok_or_else(|| self.invalid("requestBody has no `content`"))?;
        let (media_type, media) = content
            .iter()
            .next()
            .ok_or_else(|| self.invalid("requestBody `content` is empty"))?;
        let schema = media
            .get("schema")
            .and_then(Value::as_object)
            .ok_or_else(|| self.invalid(format!("requestBody '{media_type}' has no schema")))?;

        if let Some(properties) = schema
            .get("properties")
            .and_then(Value::as_object)
            .filter(|p| !p.is_empty())
        {
            let fields = properties
                .iter()
                .map(|(name, prop)| {
                    let description = prop.get("description").cloned().unwrap_or(Value::Null);
                    (name.clone(), description)
                })
                .collect();
            return Ok(Some(fields));
        }

        if let (Some(ty), Some(description)) = (schema.get("type"), schema.get("description")) {
            let key = match ty {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let mut fields = Map::new();
            fields.insert(key, description.clone());
            return Ok(Some(fields));
        }

        let mut fields = None;
        for (key, value) in schema {
            if key != "$ref" {
                return Err(self.invalid(format!(
                    "unrecognized request-body schema (unexpected key '{key}')"
                )));
            }
            let reference = value
                .as_str()
                .ok_or_else(|| self.invalid("request-body `$ref` is not a string"))?;
            fields = Some(self.component_properties(reference)?);
        }
        Ok(fields)
    }

    fn component_properties(&self, reference: &str) -> Result<Map<String, Value>> {
        let name = reference.rsplit('/').next().unwrap_or(reference);
        let component = self
            .components
            .get(name)
            .ok_or_else(|| self.invalid(format!("unresolved schema reference '{reference}'")))?;
        component
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| self.invalid(format!("component '{name}' declares no properties")))
    }

    fn parameters(&self) -> Result<Vec<ParameterDescriptor>> {
        let params = match self.operation.get("parameters") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(params)) => params,
            Some(_) => return Err(self.invalid("`parameters` is not a list")),
        };

        Ok(params.iter().map(parameter_descriptor).collect())
    }
}

fn select_success_response(responses: &Map<String, Value>) -> Option<&Value> {
    responses
        .get("200")
        .or_else(|| first_with_class(responses, '2'))
        .or_else(|| first_with_class(responses, '3'))
}

fn first_with_class(responses: &Map<String, Value>, class: char) -> Option<&Value> {
    responses
        .iter()
        .find(|(code, _)| code.starts_with(class))
        .map(|(_, response)| response)
}

fn parameter_descriptor(param: &Value) -> ParameterDescriptor {
    let text = |key: &str| param.get(key).and_then(Value::as_str);

    ParameterDescriptor {
        name: text("name").unwrap_or("Unnamed").to_string(),
        location: ParamLocation::from(text("in").unwrap_or("unknown")),
        required: param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        param_type: param
            .get("schema")
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        description: text("description")
            .unwrap_or("No description provided")
            .to_string(),
    }
}
