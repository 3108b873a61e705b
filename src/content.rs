//! Content-stream operations at the byte level.
//!
//! Operations are kept as an operator mnemonic plus its operand objects and
//! can be encoded back into content-stream bytes; interpreting what the
//! operators mean is left to the consumer.

use crate::writer::Writer;
use crate::{Object, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// The operator mnemonic, e.g. `"Tj"`.
    pub operator: String,
    /// The operands that precede the operator.
    pub operands: Vec<Object>,
}

impl Operation {
    pub fn new(operator: &str, operands: Vec<Object>) -> Operation {
        Operation {
            operator: operator.to_string(),
            operands,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    pub operations: Vec<Operation>,
}

impl Content {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        for operation in &self.operations {
            for operand in &operation.operands {
                Writer::write_object(&mut content, operand)?;
                content.push(b' ');
            }
            content.extend_from_slice(operation.operator.as_bytes());
            content.push(b'\n');
        }
        Ok(content)
    }
}
