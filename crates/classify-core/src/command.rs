//! Lifecycle commands decoded from the configuration channel

use crate::tensor::TensorInfo;
use npu_classify_common::{ClassifyError, TensorKind};
use serde::{Deserialize, Serialize};

/// Wire form of a configuration request
#[derive(Debug, Clone, Default, Deserialize)]
struct CommandDocument {
    mode: String,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    input_tensor: Option<String>,
    #[serde(default)]
    output_tensor: Option<String>,
}

impl CommandDocument {
    fn tensor_field(&self, kind: TensorKind) -> Option<String> {
        let value = match kind {
            TensorKind::Input => &self.input_tensor,
            TensorKind::Output => &self.output_tensor,
        };
        non_empty(value.clone())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a tensor index the way the command channel encodes it
pub(crate) fn parse_index(value: &str) -> Result<usize, ClassifyError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| ClassifyError::ParseError(format!("invalid tensor index {value:?}: {e}")))
}

/// A lifecycle operation
///
/// `model_name: None` targets the active network. Name and index fields left
/// empty fall back to the persisted attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateNetwork {
        model_name: Option<String>,
    },
    CreateTensor {
        model_name: Option<String>,
        kind: TensorKind,
        names: Option<String>,
    },
    LoadNetwork {
        model_name: Option<String>,
    },
    RunNetwork {
        model_name: Option<String>,
    },
    CheckResult {
        model_name: Option<String>,
    },
    UnloadNetwork {
        model_name: Option<String>,
    },
    GetTensorByName {
        model_name: Option<String>,
        kind: TensorKind,
        name: Option<String>,
    },
    GetTensorByIndex {
        model_name: Option<String>,
        kind: TensorKind,
        index: Option<usize>,
    },
    ListTensors {
        model_name: Option<String>,
        kind: TensorKind,
    },
    CountTensors {
        model_name: Option<String>,
        kind: TensorKind,
    },
}

impl Command {
    /// Decode a JSON request body
    pub fn parse(body: &str) -> Result<Self, ClassifyError> {
        let document: CommandDocument = serde_json::from_str(body)?;
        Self::from_document(document)
    }

    fn from_document(doc: CommandDocument) -> Result<Self, ClassifyError> {
        let model_name = non_empty(doc.model_name.clone());

        let command = match doc.mode.as_str() {
            "create_network" => Command::CreateNetwork { model_name },
            "create_input_tensor" | "create_output_tensor" => {
                let kind = kind_of(&doc.mode);
                Command::CreateTensor {
                    model_name,
                    kind,
                    names: doc.tensor_field(kind),
                }
            }
            "load_network" => Command::LoadNetwork { model_name },
            "run_network" => Command::RunNetwork { model_name },
            "check_parse_result" => Command::CheckResult { model_name },
            "unload_network" => Command::UnloadNetwork { model_name },
            "get_input_tensor_name" | "get_output_tensor_name" => {
                let kind = kind_of(&doc.mode);
                Command::GetTensorByName {
                    model_name,
                    kind,
                    name: doc.tensor_field(kind),
                }
            }
            "get_input_tensor_index" | "get_output_tensor_index" => {
                let kind = kind_of(&doc.mode);
                let index = doc
                    .tensor_field(kind)
                    .map(|v| parse_index(&v))
                    .transpose()?;
                Command::GetTensorByIndex {
                    model_name,
                    kind,
                    index,
                }
            }
            "get_all_input_tensors" | "get_all_output_tensors" => Command::ListTensors {
                model_name,
                kind: kind_of(&doc.mode),
            },
            "get_input_tensor_count" | "get_output_tensor_count" => Command::CountTensors {
                model_name,
                kind: kind_of(&doc.mode),
            },
            other => return Err(ClassifyError::UnsupportedCommand(other.to_string())),
        };

        Ok(command)
    }

    /// Wire tag of this command
    pub fn mode(&self) -> &'static str {
        use TensorKind::{Input, Output};
        match self {
            Command::CreateNetwork { .. } => "create_network",
            Command::CreateTensor { kind: Input, .. } => "create_input_tensor",
            Command::CreateTensor { kind: Output, .. } => "create_output_tensor",
            Command::LoadNetwork { .. } => "load_network",
            Command::RunNetwork { .. } => "run_network",
            Command::CheckResult { .. } => "check_parse_result",
            Command::UnloadNetwork { .. } => "unload_network",
            Command::GetTensorByName { kind: Input, .. } => "get_input_tensor_name",
            Command::GetTensorByName { kind: Output, .. } => "get_output_tensor_name",
            Command::GetTensorByIndex { kind: Input, .. } => "get_input_tensor_index",
            Command::GetTensorByIndex { kind: Output, .. } => "get_output_tensor_index",
            Command::ListTensors { kind: Input, .. } => "get_all_input_tensors",
            Command::ListTensors { kind: Output, .. } => "get_all_output_tensors",
            Command::CountTensors { kind: Input, .. } => "get_input_tensor_count",
            Command::CountTensors { kind: Output, .. } => "get_output_tensor_count",
        }
    }
}

fn kind_of(mode: &str) -> TensorKind {
    if mode.contains("input") {
        TensorKind::Input
    } else {
        TensorKind::Output
    }
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CommandOutput {
    /// Lifecycle step completed
    Done,
    Tensor(TensorInfo),
    Tensors(Vec<TensorInfo>),
    Count(usize),
}
