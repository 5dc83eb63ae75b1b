//! # Template Registry
//!
//! Static descriptions of the SmartREST static templates this device speaks:
//! the inventory, measurement, event, alarm and operation-status templates it
//! publishes, and the operation templates it accepts.
//!
//! The table is defined once and never mutated. Both directions use it: the
//! dispatcher to validate and extract inbound rows, and fact encoding to
//! refuse outbound rows that do not have the shape their template declares.

use crate::error::DispatchError;
use crate::operation::OperationKind;
use crate::row::TemplateRow;

/// Which way a template travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Device to platform, on the upstream topic.
    Upstream,
    /// Platform to device, on the downstream topic.
    Downstream,
}

/// How the fields after the identifier are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Shape {
    /// One field per role; trailing roles may be omitted down to the minimum.
    Fixed,
    /// The last role repeats any number of times.
    VariableTail,
    /// After `prefix` fields (identifier included), groups of `width` fields
    /// repeat. The roles list names the prefix roles followed by one group.
    Repeating { prefix: usize, width: usize },
}

/// Shape descriptor for one static template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateDescriptor {
    /// The numeric identifier, as it appears in field 0.
    pub id: &'static str,
    /// Human readable name, for logs.
    pub name: &'static str,
    pub direction: Direction,
    /// Minimum number of fields, identifier included.
    pub min_fields: usize,
    /// Semantic names of the fields after the identifier.
    pub roles: &'static [&'static str],
    pub shape: Shape,
    /// The operation a downstream template requests.
    pub operation: Option<OperationKind>,
}

impl TemplateDescriptor {
    const fn upstream(
        id: &'static str,
        name: &'static str,
        min_fields: usize,
        roles: &'static [&'static str],
        shape: Shape,
    ) -> Self {
        Self {
            id,
            name,
            direction: Direction::Upstream,
            min_fields,
            roles,
            shape,
            operation: None,
        }
    }

    const fn operation(
        id: &'static str,
        name: &'static str,
        min_fields: usize,
        roles: &'static [&'static str],
        shape: Shape,
        kind: OperationKind,
    ) -> Self {
        Self {
            id,
            name,
            direction: Direction::Downstream,
            min_fields,
            roles,
            shape,
            operation: Some(kind),
        }
    }

    /// Whether the trailing fields of this template repeat.
    pub fn has_variable_tail(&self) -> bool {
        !matches!(self.shape, Shape::Fixed)
    }

    /// Number of repeating groups in a row of `total` fields.
    ///
    /// Returns `Ok(0)` for templates without groups.
    pub fn group_count(&self, total: usize) -> Result<usize, DispatchError> {
        let Shape::Repeating { prefix, width } = self.shape else {
            return Ok(0);
        };
        let tail = total.saturating_sub(prefix);
        if tail % width != 0 {
            return Err(DispatchError::UnevenGroups {
                template: self.id,
                width,
                found: tail,
            });
        }
        Ok(tail / width)
    }

    /// Checks a row's field count against this descriptor.
    ///
    /// Returns the number of repeating groups on success.
    pub fn check(&self, row: &TemplateRow) -> Result<usize, DispatchError> {
        self.check_count(row.len())
    }

    /// Checks a field count, identifier included, against this descriptor.
    pub fn check_count(&self, found: usize) -> Result<usize, DispatchError> {
        if found < self.min_fields {
            return Err(DispatchError::TooFewFields {
                template: self.id,
                expected: self.min_fields,
                found,
            });
        }
        if matches!(self.shape, Shape::Fixed) && found > self.roles.len() + 1 {
            debug!("template {} row has {} fields, extras ignored", self.id, found);
        }
        self.group_count(found)
    }
}

const POSITION: &[&str] = &["latitude", "longitude", "altitude", "accuracy"];
const ALARM: &[&str] = &["type", "text", "time"];

static TEMPLATES: &[TemplateDescriptor] = &[
    TemplateDescriptor::upstream("100", "device creation", 1, &["name", "type"], Shape::Fixed),
    TemplateDescriptor::upstream(
        "110",
        "hardware",
        1,
        &["serialNumber", "model", "revision"],
        Shape::Fixed,
    ),
    TemplateDescriptor::upstream("112", "position", 3, POSITION, Shape::Fixed),
    TemplateDescriptor::upstream("114", "capabilities", 2, &["fragment"], Shape::VariableTail),
    TemplateDescriptor::upstream("115", "firmware", 3, &["name", "version", "url"], Shape::Fixed),
    TemplateDescriptor::upstream(
        "116",
        "software list",
        1,
        &["name", "version", "url"],
        Shape::Repeating { prefix: 1, width: 3 },
    ),
    TemplateDescriptor::upstream("117", "required interval", 2, &["interval"], Shape::Fixed),
    TemplateDescriptor::upstream("118", "log file types", 2, &["type"], Shape::VariableTail),
    TemplateDescriptor::upstream(
        "122",
        "agent",
        3,
        &["name", "version", "url", "maintainer"],
        Shape::Fixed,
    ),
    TemplateDescriptor::upstream(
        "200",
        "measurement",
        4,
        &["fragment", "series", "value", "unit", "time", "source"],
        Shape::Fixed,
    ),
    TemplateDescriptor::upstream(
        "201",
        "series measurement",
        7,
        &["type", "time", "fragment", "series", "value", "unit"],
        Shape::Repeating { prefix: 3, width: 4 },
    ),
    TemplateDescriptor::upstream("301", "critical alarm", 2, ALARM, Shape::Fixed),
    TemplateDescriptor::upstream("302", "major alarm", 2, ALARM, Shape::Fixed),
    TemplateDescriptor::upstream("303", "minor alarm", 2, ALARM, Shape::Fixed),
    TemplateDescriptor::upstream("304", "warning alarm", 2, ALARM, Shape::Fixed),
    TemplateDescriptor::upstream("400", "event", 3, &["type", "text", "time"], Shape::Fixed),
    TemplateDescriptor::upstream("501", "operation executing", 2, &["fragment"], Shape::Fixed),
    TemplateDescriptor::upstream(
        "502",
        "operation failed",
        2,
        &["fragment", "reason"],
        Shape::Fixed,
    ),
    TemplateDescriptor::upstream(
        "503",
        "operation successful",
        2,
        &["fragment", "parameter"],
        Shape::VariableTail,
    ),
    TemplateDescriptor::operation(
        "510",
        "restart",
        2,
        &["serial"],
        Shape::Fixed,
        OperationKind::Restart,
    ),
    TemplateDescriptor::operation(
        "511",
        "shell command",
        3,
        &["serial", "command"],
        Shape::Fixed,
        OperationKind::Shell,
    ),
    TemplateDescriptor::operation(
        "515",
        "firmware update",
        5,
        &["serial", "name", "version", "url"],
        Shape::Fixed,
        OperationKind::FirmwareUpdate,
    ),
    TemplateDescriptor::operation(
        "522",
        "log file request",
        7,
        &["serial", "logFile", "dateFrom", "dateTo", "searchText", "maxLines"],
        Shape::Fixed,
        OperationKind::LogfileRequest,
    ),
    TemplateDescriptor::operation(
        "528",
        "software update",
        6,
        &["serial", "name", "version", "url", "action"],
        Shape::Repeating { prefix: 2, width: 4 },
        OperationKind::SoftwareUpdate,
    ),
    TemplateDescriptor::operation(
        "530",
        "remote access connect",
        5,
        &["serial", "hostname", "port", "connectionKey"],
        Shape::Fixed,
        OperationKind::RemoteAccessConnect,
    ),
];

/// Looks up the descriptor for a template identifier.
pub fn describe(id: &str) -> Option<&'static TemplateDescriptor> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// Iterates over every known template.
pub fn all() -> impl Iterator<Item = &'static TemplateDescriptor> {
    TEMPLATES.iter()
}
