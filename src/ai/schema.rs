//! Structure Schema Templates
//!
//! One JSON schema per structure type, embedded in the system instruction so
//! the model knows which shape (and which tag) to return.

use serde_json::{Value, json};

use crate::types::StructureType;

fn text_field(description: &str) -> Value {
    json!({ "type": "string", "minLength": 1, "description": description })
}

fn module_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "content"],
        "properties": {
            "name": text_field("Short module name"),
            "content": text_field("Module instructions")
        }
    })
}

fn tag(structure: StructureType) -> Value {
    json!({ "type": "string", "const": structure.as_str() })
}

/// JSON schema the response must satisfy for a structure type
pub fn schema_for(structure: StructureType) -> Value {
    match structure {
        StructureType::Standard => json!({
            "type": "object",
            "required": ["structureType", "segments"],
            "properties": {
                "structureType": tag(structure),
                "segments": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["content"],
                        "properties": { "content": text_field("Prompt text segment") }
                    }
                }
            }
        }),
        StructureType::Structured => json!({
            "type": "object",
            "required": ["structureType", "sections"],
            "properties": {
                "structureType": tag(structure),
                "sections": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["title", "content"],
                        "properties": {
                            "title": text_field("Section heading"),
                            "content": text_field("Section body")
                        }
                    }
                }
            }
        }),
        StructureType::Modulized => json!({
            "type": "object",
            "required": ["structureType", "modules"],
            "properties": {
                "structureType": tag(structure),
                "modules": { "type": "array", "minItems": 1, "items": module_schema() }
            }
        }),
        StructureType::Advanced => json!({
            "type": "object",
            "required": ["structureType", "blocks"],
            "properties": {
                "structureType": tag(structure),
                "blocks": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name", "modules"],
                        "properties": {
                            "name": text_field("Block name"),
                            "modules": { "type": "array", "minItems": 1, "items": module_schema() }
                        }
                    }
                }
            }
        }),
    }
}

/// One-line description of each shape, used in the system instruction
pub fn shape_description(structure: StructureType) -> &'static str {
    match structure {
        StructureType::Standard => "a flat list of prompt text segments",
        StructureType::Structured => "titled sections (role, context, task, constraints, output)",
        StructureType::Modulized => "named, reusable modules that can be recombined",
        StructureType::Advanced => "named blocks, each grouping several named modules",
    }
}
