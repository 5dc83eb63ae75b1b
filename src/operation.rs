//! # Operation Requests and Dispatch
//!
//! Turns a decoded downstream row into a strongly-typed [`OperationRequest`].
//! The template registry says which identifiers are operations and what shape
//! their rows have; this module only extracts the parameters. Dispatch is
//! stateless and never publishes anything.

use core::str::FromStr;

use heapless::{String, Vec};

use crate::config::{MAX_PACKAGES, MAX_PARAM_LEN, MAX_TEXT_LEN};
use crate::error::DispatchError;
use crate::row::TemplateRow;
use crate::template::{self, Shape, TemplateDescriptor};

/// A short operation parameter: serial, name or version.
pub type Param = String<MAX_PARAM_LEN>;

/// A long operation parameter: URL, command line or search text.
pub type Text = String<MAX_TEXT_LEN>;

/// The operations this device knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationKind {
    Restart,
    Shell,
    FirmwareUpdate,
    LogfileRequest,
    SoftwareUpdate,
    RemoteAccessConnect,
}

impl OperationKind {
    /// The platform fragment reported in operation status rows.
    pub fn capability(self) -> &'static str {
        match self {
            OperationKind::Restart => "c8y_Restart",
            OperationKind::Shell => "c8y_Command",
            OperationKind::FirmwareUpdate => "c8y_Firmware",
            OperationKind::LogfileRequest => "c8y_LogfileRequest",
            OperationKind::SoftwareUpdate => "c8y_SoftwareUpdate",
            OperationKind::RemoteAccessConnect => "c8y_RemoteAccessConnect",
        }
    }
}

/// `510,<serial>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restart {
    pub serial: Param,
}

/// `511,<serial>,<command>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub serial: Param,
    pub command: Text,
}

/// `515,<serial>,<name>,<version>,<url>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareUpdate {
    pub serial: Param,
    pub name: Param,
    pub version: Param,
    pub url: Text,
}

/// `522,<serial>,<log file>,<from>,<to>,<search text>,<max lines>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogfileRequest {
    pub serial: Param,
    pub log_file: Param,
    pub date_from: Param,
    pub date_to: Param,
    pub search_text: Text,
    pub max_lines: u32,
}

/// What to do with one software package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftwareAction {
    Install,
    Delete,
    /// An action this crate has no name for, kept verbatim.
    Other(Param),
}

impl SoftwareAction {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "install" => Some(SoftwareAction::Install),
            "delete" => Some(SoftwareAction::Delete),
            other => Param::try_from(other).ok().map(SoftwareAction::Other),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SoftwareAction::Install => "install",
            SoftwareAction::Delete => "delete",
            SoftwareAction::Other(action) => action.as_str(),
        }
    }
}

/// One `{name, version, url, action}` group of a software update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwarePackage {
    pub name: Param,
    pub version: Param,
    pub url: Text,
    pub action: SoftwareAction,
}

/// `528,<serial>` followed by any number of package groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareUpdate {
    pub serial: Param,
    pub packages: Vec<SoftwarePackage, MAX_PACKAGES>,
}

/// `530,<serial>,<host>,<port>,<connection key>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccessConnect {
    pub serial: Param,
    pub host: Param,
    pub port: u16,
    pub connection_key: Text,
}

/// A platform request decoded from one downstream row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Restart(Restart),
    Shell(ShellCommand),
    FirmwareUpdate(FirmwareUpdate),
    LogfileRequest(LogfileRequest),
    SoftwareUpdate(SoftwareUpdate),
    RemoteAccessConnect(RemoteAccessConnect),
    /// A template this device does not handle. Not an error.
    Unsupported { template: Param },
}

impl OperationRequest {
    /// The operation kind, `None` for unsupported templates.
    pub fn kind(&self) -> Option<OperationKind> {
        Some(match self {
            OperationRequest::Restart(_) => OperationKind::Restart,
            OperationRequest::Shell(_) => OperationKind::Shell,
            OperationRequest::FirmwareUpdate(_) => OperationKind::FirmwareUpdate,
            OperationRequest::LogfileRequest(_) => OperationKind::LogfileRequest,
            OperationRequest::SoftwareUpdate(_) => OperationKind::SoftwareUpdate,
            OperationRequest::RemoteAccessConnect(_) => OperationKind::RemoteAccessConnect,
            OperationRequest::Unsupported { .. } => return None,
        })
    }

    /// The serial of the device the operation targets.
    pub fn serial(&self) -> Option<&str> {
        let serial = match self {
            OperationRequest::Restart(op) => &op.serial,
            OperationRequest::Shell(op) => &op.serial,
            OperationRequest::FirmwareUpdate(op) => &op.serial,
            OperationRequest::LogfileRequest(op) => &op.serial,
            OperationRequest::SoftwareUpdate(op) => &op.serial,
            OperationRequest::RemoteAccessConnect(op) => &op.serial,
            OperationRequest::Unsupported { .. } => return None,
        };
        Some(serial.as_str())
    }
}

/// Why an action handler could not complete an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    reason: Text,
}

impl Failure {
    /// Creates a failure; reasons longer than a text parameter are cut short.
    pub fn new(reason: &str) -> Self {
        let mut text = Text::new();
        for c in reason.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        Self { reason: text }
    }

    /// The failure reported for operations a device does not implement.
    pub fn unsupported() -> Self {
        Self::new("operation not supported by this device")
    }

    /// The failure reported when the link dropped while the action ran.
    pub fn cancelled() -> Self {
        Self::new("operation cancelled")
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Where an operation stands, as reported to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Executing,
    Successful,
    Failed(Failure),
}

/// Resolves a decoded row into an operation request.
///
/// Identifiers that are unknown, or known but not operations, yield
/// [`OperationRequest::Unsupported`]. Rows of operation templates that do not
/// match their descriptor fail instead of being truncated.
pub fn dispatch(row: &TemplateRow) -> Result<OperationRequest, DispatchError> {
    let id = row.template();
    let Some((descriptor, kind)) =
        template::describe(id).and_then(|d| d.operation.map(|kind| (d, kind)))
    else {
        return Ok(OperationRequest::Unsupported {
            template: truncated(id),
        });
    };

    let groups = descriptor.check(row)?;
    let fields = Fields { row, descriptor };
    let request = match kind {
        OperationKind::Restart => OperationRequest::Restart(Restart {
            serial: fields.bounded(1)?,
        }),
        OperationKind::Shell => OperationRequest::Shell(ShellCommand {
            serial: fields.bounded(1)?,
            command: fields.bounded(2)?,
        }),
        OperationKind::FirmwareUpdate => OperationRequest::FirmwareUpdate(FirmwareUpdate {
            serial: fields.bounded(1)?,
            name: fields.bounded(2)?,
            version: fields.bounded(3)?,
            url: fields.bounded(4)?,
        }),
        OperationKind::LogfileRequest => OperationRequest::LogfileRequest(LogfileRequest {
            serial: fields.bounded(1)?,
            log_file: fields.bounded(2)?,
            date_from: fields.bounded(3)?,
            date_to: fields.bounded(4)?,
            search_text: fields.bounded(5)?,
            max_lines: fields.number(6)?,
        }),
        OperationKind::SoftwareUpdate => OperationRequest::SoftwareUpdate(SoftwareUpdate {
            serial: fields.bounded(1)?,
            packages: fields.packages(groups)?,
        }),
        OperationKind::RemoteAccessConnect => {
            OperationRequest::RemoteAccessConnect(RemoteAccessConnect {
                serial: fields.bounded(1)?,
                host: fields.bounded(2)?,
                port: fields.number(3)?,
                connection_key: fields.bounded(4)?,
            })
        }
    };
    Ok(request)
}

/// Parameter extraction for one row, with errors naming the template.
struct Fields<'r> {
    row: &'r TemplateRow,
    descriptor: &'static TemplateDescriptor,
}

impl Fields<'_> {
    fn raw(&self, index: usize) -> &str {
        self.row.field(index).unwrap_or("")
    }

    fn bounded<const N: usize>(&self, index: usize) -> Result<String<N>, DispatchError> {
        String::try_from(self.raw(index)).map_err(|_| DispatchError::FieldTooLong {
            template: self.descriptor.id,
            index,
        })
    }

    fn number<T: FromStr>(&self, index: usize) -> Result<T, DispatchError> {
        self.raw(index)
            .trim()
            .parse()
            .map_err(|_| DispatchError::InvalidNumber {
                template: self.descriptor.id,
                index,
            })
    }

    fn packages(&self, groups: usize) -> Result<Vec<SoftwarePackage, MAX_PACKAGES>, DispatchError> {
        let Shape::Repeating { prefix, width } = self.descriptor.shape else {
            return Ok(Vec::new());
        };
        let too_many = DispatchError::TooManyGroups {
            template: self.descriptor.id,
            found: groups,
        };
        if groups > MAX_PACKAGES {
            return Err(too_many);
        }

        let mut packages = Vec::new();
        for group in 0..groups {
            let base = prefix + group * width;
            let action = SoftwareAction::parse(self.raw(base + 3)).ok_or(
                DispatchError::FieldTooLong {
                    template: self.descriptor.id,
                    index: base + 3,
                },
            )?;
            let package = SoftwarePackage {
                name: self.bounded(base)?,
                version: self.bounded(base + 1)?,
                url: self.bounded(base + 2)?,
                action,
            };
            packages.push(package).map_err(|_| too_many)?;
        }
        Ok(packages)
    }
}

/// Copies as much of `s` as fits into a parameter, on a char boundary.
fn truncated(s: &str) -> Param {
    let mut out = Param::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::row::decode;

    fn dispatch_str(raw: &str) -> Result<OperationRequest, DispatchError> {
        dispatch(&decode(raw).unwrap())
    }

    #[test]
    fn firmware_update_fields_are_extracted_in_order() {
        let request = dispatch_str("515,dev1,fwA,2.0,http://x").unwrap();
        let OperationRequest::FirmwareUpdate(fw) = request else {
            panic!("unexpected request kind");
        };
        assert_eq!(fw.serial.as_str(), "dev1");
        assert_eq!(fw.name.as_str(), "fwA");
        assert_eq!(fw.version.as_str(), "2.0");
        assert_eq!(fw.url.as_str(), "http://x");
    }

    #[test]
    fn software_update_yields_one_package_per_group() {
        let request = dispatch_str("528,dev1,sw1,1.0,u1,install,sw2,2.0,u2,install").unwrap();
        let OperationRequest::SoftwareUpdate(update) = request else {
            panic!("unexpected request kind");
        };
        assert_eq!(update.serial.as_str(), "dev1");
        assert_eq!(update.packages.len(), 2);
        let first = &update.packages[0];
        assert_eq!(
            (first.name.as_str(), first.version.as_str(), first.url.as_str()),
            ("sw1", "1.0", "u1")
        );
        assert_eq!(first.action, SoftwareAction::Install);
        let second = &update.packages[1];
        assert_eq!(
            (second.name.as_str(), second.version.as_str(), second.url.as_str()),
            ("sw2", "2.0", "u2")
        );
        assert_eq!(second.action.as_str(), "install");
    }

    #[test]
    fn software_update_keeps_unknown_actions() {
        let request = dispatch_str("528,dev1,sw1,1.0,,delete,sw2,2.0,u2,upgrade").unwrap();
        let OperationRequest::SoftwareUpdate(update) = request else {
            panic!("unexpected request kind");
        };
        assert_eq!(update.packages[0].action, SoftwareAction::Delete);
        assert_eq!(update.packages[0].url.as_str(), "");
        assert_eq!(update.packages[1].action.as_str(), "upgrade");
    }

    #[test]
    fn software_update_with_partial_group_is_malformed() {
        assert_eq!(
            dispatch_str("528,dev1,sw1,1.0,u1,install,sw2"),
            Err(DispatchError::UnevenGroups {
                template: "528",
                width: 4,
                found: 5,
            })
        );
    }

    #[test]
    fn log_and_remote_access_parse_numbers() {
        let request = dispatch_str(
            "522,dev1,syslog,2013-06-22T17:03:14.000+02:00,2013-06-22T18:03:14.000+02:00,ERROR,1000",
        )
        .unwrap();
        let OperationRequest::LogfileRequest(log) = request else {
            panic!("unexpected request kind");
        };
        assert_eq!(log.log_file.as_str(), "syslog");
        assert_eq!(log.search_text.as_str(), "ERROR");
        assert_eq!(log.max_lines, 1000);

        let request = dispatch_str("530,dev1,10.0.0.67,22,eb5e9d13-1caa-486b-bdda-130ca0d87df8").unwrap();
        let OperationRequest::RemoteAccessConnect(remote) = request else {
            panic!("unexpected request kind");
        };
        assert_eq!(remote.host.as_str(), "10.0.0.67");
        assert_eq!(remote.port, 22);

        assert_eq!(
            dispatch_str("530,dev1,10.0.0.67,ssh,key"),
            Err(DispatchError::InvalidNumber {
                template: "530",
                index: 3,
            })
        );
    }

    #[rstest]
    #[case("510,dev1", OperationKind::Restart)]
    #[case("511,dev1,\"ls -la, /tmp\"", OperationKind::Shell)]
    #[case("515,dev1,fw,1.0,http://x", OperationKind::FirmwareUpdate)]
    #[case("522,dev1,log,a,b,,10", OperationKind::LogfileRequest)]
    #[case("528,dev1,sw,1,u,install", OperationKind::SoftwareUpdate)]
    #[case("530,dev1,host,2222,key", OperationKind::RemoteAccessConnect)]
    fn every_operation_template_dispatches(#[case] raw: &str, #[case] kind: OperationKind) {
        let request = dispatch_str(raw).unwrap();
        assert_eq!(request.kind(), Some(kind));
        assert_eq!(request.serial(), Some("dev1"));
    }

    #[test]
    fn rows_below_minimum_fail_for_every_operation_template() {
        for descriptor in template::all().filter(|t| t.operation.is_some()) {
            let mut fields = std::vec![descriptor.id];
            fields.resize(descriptor.min_fields - 1, "x");
            let row = TemplateRow::from_fields(fields).unwrap();
            assert_eq!(
                dispatch(&row),
                Err(DispatchError::TooFewFields {
                    template: descriptor.id,
                    expected: descriptor.min_fields,
                    found: descriptor.min_fields - 1,
                }),
                "template {}",
                descriptor.id
            );
        }
    }

    #[rstest]
    #[case("999,dev1", "999")]
    #[case("115,fw,1.0,url", "115")]
    #[case("abc", "abc")]
    fn unknown_and_upstream_templates_are_unsupported(#[case] raw: &str, #[case] id: &str) {
        let request = dispatch_str(raw).unwrap();
        assert_eq!(request.kind(), None);
        assert_eq!(request, OperationRequest::Unsupported { template: truncated(id) });
    }

    #[test]
    fn oversized_parameters_are_rejected() {
        let serial = "s".repeat(MAX_PARAM_LEN + 1);
        let row = TemplateRow::from_fields(["510", serial.as_str()]).unwrap();
        assert_eq!(
            dispatch(&row),
            Err(DispatchError::FieldTooLong {
                template: "510",
                index: 1,
            })
        );
    }

    #[test]
    fn capabilities_match_platform_fragments() {
        assert_eq!(OperationKind::Restart.capability(), "c8y_Restart");
        assert_eq!(OperationKind::Shell.capability(), "c8y_Command");
        assert_eq!(OperationKind::FirmwareUpdate.capability(), "c8y_Firmware");
        assert_eq!(OperationKind::LogfileRequest.capability(), "c8y_LogfileRequest");
        assert_eq!(OperationKind::SoftwareUpdate.capability(), "c8y_SoftwareUpdate");
        assert_eq!(
            OperationKind::RemoteAccessConnect.capability(),
            "c8y_RemoteAccessConnect"
        );
    }
}
