//! Structural conformance checking.
//!
//! [`check_with_report`] walks a chunk tree, verifies the layout
//! invariants, and reports every problem it finds through a caller
//! supplied sink — validation never throws, so a single pass observes all
//! problems. The tree's overall [`QualityLevel`] is the minimum level
//! encountered anywhere in it.

use core::fmt::{Display, Formatter};

use tracing::warn;

use crate::chunk::{Chunk, ChunkBody, GroupKind};
use crate::path::AttributePath;
use crate::{FourCC, PROP};

/// Outcome of validating a chunk or a whole tree.
///
/// The ordering is significant: combining levels takes the minimum, so
/// `Invalid` anywhere makes the whole tree `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityLevel {
    /// Violates the binary-layout rules of the format.
    Invalid,
    /// Structurally parseable but the content is inconsistent.
    Garbage,
    /// Usable despite recoverable layout issues.
    Ok,
    /// Fully conformant.
    Perfect,
}

impl Display for QualityLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            QualityLevel::Invalid => "INVALID",
            QualityLevel::Garbage => "GARBAGE",
            QualityLevel::Ok => "OK",
            QualityLevel::Perfect => "PERFECT",
        };
        write!(f, "{name}")
    }
}

/// A single problem found during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessage {
    /// Where in the hierarchy the problem sits.
    pub path: AttributePath,
    /// Severity the problem degrades the tree to.
    pub level: QualityLevel,
    /// Human-readable description.
    pub message: String,
}

/// Validates a chunk tree, reporting problems as `tracing` warnings.
pub fn check(chunk: &Chunk) -> QualityLevel {
    check_with_report(chunk, &mut |message: CheckMessage| {
        warn!("{} at {}: {}", message.level, message.path, message.message);
    })
}

/// Validates a chunk tree, reporting every problem through `report`.
pub fn check_with_report(
    chunk: &Chunk,
    report: &mut dyn FnMut(CheckMessage),
) -> QualityLevel {
    let mut path = AttributePath::new();
    check_chunk(chunk, None, None, &mut path, report)
}

fn note(
    path: &AttributePath,
    report: &mut dyn FnMut(CheckMessage),
    level: &mut QualityLevel,
    severity: QualityLevel,
    message: String,
) {
    report(CheckMessage {
        path: path.clone(),
        level: severity,
        message,
    });
    *level = (*level).min(severity);
}

fn check_chunk(
    chunk: &Chunk,
    form_context: Option<FourCC>,
    index: Option<usize>,
    path: &mut AttributePath,
    report: &mut dyn FnMut(CheckMessage),
) -> QualityLevel {
    match index {
        Some(i) => path.push_indexed_chunk(chunk.id, i),
        None => path.push_chunk(chunk.id),
    }
    let mut level = QualityLevel::Perfect;

    if !chunk.id.is_valid_id() {
        note(
            path,
            report,
            &mut level,
            QualityLevel::Invalid,
            format!("chunk id {:?} is not a valid identifier", chunk.id),
        );
    }
    if chunk.size < 0 {
        note(
            path,
            report,
            &mut level,
            QualityLevel::Invalid,
            format!("negative chunk size {}", chunk.size),
        );
    }

    match &chunk.body {
        ChunkBody::Raw(raw) => {
            if chunk.size >= 0 && raw.data().len() as i64 != i64::from(chunk.size) {
                note(
                    path,
                    report,
                    &mut level,
                    QualityLevel::Invalid,
                    format!(
                        "declared size {} differs from payload length {}",
                        chunk.size,
                        raw.data().len()
                    ),
                );
            }
        }
        ChunkBody::App(app) => {
            level = level.min(app.check_contents(path, report));
        }
        ChunkBody::Group(group) => {
            path.set_form_type(group.contents_type);

            let type_ok = match group.kind {
                GroupKind::Form | GroupKind::Prop => group.contents_type.is_valid_form_type(),
                GroupKind::List | GroupKind::Cat => {
                    group.contents_type == FourCC::BLANK
                        || group.contents_type.is_valid_form_type()
                }
            };
            if !type_ok {
                note(
                    path,
                    report,
                    &mut level,
                    QualityLevel::Invalid,
                    format!(
                        "{:?} is not a valid contents type for {}",
                        group.contents_type,
                        group.kind.id()
                    ),
                );
            }

            match group.body_size() {
                Ok(expected) => {
                    if i64::from(chunk.size) != expected {
                        note(
                            path,
                            report,
                            &mut level,
                            QualityLevel::Invalid,
                            format!(
                                "group size {} differs from computed size {expected}",
                                chunk.size
                            ),
                        );
                    }
                }
                Err(_) => {
                    note(
                        path,
                        report,
                        &mut level,
                        QualityLevel::Invalid,
                        "group size overflows a signed 32-bit length".to_string(),
                    );
                }
            }

            let child_context = match group.kind {
                GroupKind::Form | GroupKind::Prop => Some(group.contents_type),
                GroupKind::List | GroupKind::Cat => form_context,
            };

            let mut seen_form = false;
            for (i, child) in group.children.iter().enumerate() {
                check_child_placement(
                    group.kind,
                    group.contents_type,
                    child,
                    i,
                    &mut seen_form,
                    path,
                    report,
                    &mut level,
                );
                level = level.min(check_chunk(child, child_context, Some(i), path, report));
            }
        }
    }

    path.pop();
    level
}

#[allow(clippy::too_many_arguments)]
fn check_child_placement(
    kind: GroupKind,
    contents_type: FourCC,
    child: &Chunk,
    index: usize,
    seen_form: &mut bool,
    path: &mut AttributePath,
    report: &mut dyn FnMut(CheckMessage),
    level: &mut QualityLevel,
) {
    path.push_indexed_chunk(child.id, index);
    match kind {
        GroupKind::Form => {
            // PROP is only legal as a direct child of a LIST.
            if child.group_kind() == Some(GroupKind::Prop) {
                note(
                    path,
                    report,
                    level,
                    QualityLevel::Invalid,
                    "PROP chunk inside a FORM".to_string(),
                );
            }
        }
        GroupKind::List => match child.group_kind() {
            Some(GroupKind::Prop) => {
                if *seen_form {
                    note(
                        path,
                        report,
                        level,
                        QualityLevel::Ok,
                        "PROP appears after a FORM in this LIST".to_string(),
                    );
                }
            }
            Some(GroupKind::Form) => {
                *seen_form = true;
                check_member_type(contents_type, child, path, report, level);
            }
            _ => {
                note(
                    path,
                    report,
                    level,
                    QualityLevel::Invalid,
                    format!("{} is not a valid LIST child, expected PROP or FORM", child.id),
                );
            }
        },
        GroupKind::Cat => match child.group_kind() {
            Some(GroupKind::Form | GroupKind::List | GroupKind::Cat) => {
                check_member_type(contents_type, child, path, report, level);
            }
            _ => {
                note(
                    path,
                    report,
                    level,
                    QualityLevel::Invalid,
                    format!(
                        "{} is not a valid CAT child, expected FORM, LIST or CAT",
                        child.id
                    ),
                );
            }
        },
        GroupKind::Prop => {
            if child.is_group() {
                note(
                    path,
                    report,
                    level,
                    QualityLevel::Invalid,
                    format!("group chunk {} inside a PROP body", child.id),
                );
            } else if child.id == PROP {
                note(
                    path,
                    report,
                    level,
                    QualityLevel::Invalid,
                    "PROP chunk inside a PROP body".to_string(),
                );
            }
        }
    }
    path.pop();
}

fn check_member_type(
    contents_type: FourCC,
    child: &Chunk,
    path: &mut AttributePath,
    report: &mut dyn FnMut(CheckMessage),
    level: &mut QualityLevel,
) {
    if contents_type == FourCC::BLANK {
        return;
    }
    if let Some(member_type) = child.contents_type() {
        if member_type != contents_type {
            note(
                path,
                report,
                level,
                QualityLevel::Garbage,
                format!("member type {member_type} differs from declared type {contents_type}"),
            );
        }
    }
}

#[allow(clippy::dbg_macro)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::Chunk;

    fn collect(chunk: &Chunk) -> (QualityLevel, Vec<CheckMessage>) {
        let mut messages = Vec::new();
        let level = check_with_report(chunk, &mut |message| messages.push(message));
        (level, messages)
    }

    #[test]
    fn well_formed_list_is_perfect() {
        let ilbm = FourCC(*b"ILBM");
        let list = Chunk::list(
            ilbm,
            vec![
                Chunk::prop(
                    ilbm,
                    vec![Chunk::raw(FourCC(*b"CMAP"), vec![0, 1, 2, 3]).unwrap()],
                )
                .unwrap(),
                Chunk::form(ilbm, vec![]).unwrap(),
                Chunk::form(ilbm, vec![Chunk::raw(FourCC(*b"BODY"), vec![9, 9]).unwrap()])
                    .unwrap(),
            ],
        )
        .unwrap();
        let (level, messages) = collect(&list);
        assert_eq!(level, QualityLevel::Perfect);
        assert!(messages.is_empty());
    }

    #[test]
    fn misordered_prop_degrades_to_ok() {
        let ilbm = FourCC(*b"ILBM");
        let list = Chunk::list(
            ilbm,
            vec![
                Chunk::form(ilbm, vec![]).unwrap(),
                Chunk::prop(ilbm, vec![Chunk::raw(FourCC(*b"CMAP"), vec![0, 1]).unwrap()])
                    .unwrap(),
            ],
        )
        .unwrap();
        let (level, messages) = collect(&list);
        assert_eq!(level, QualityLevel::Ok);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, QualityLevel::Ok);
        assert_eq!(messages[0].path.to_string(), "LIST.ILBM / PROP[1]");
    }

    #[test]
    fn wildcard_cat_accepts_mixed_forms() {
        let cat = Chunk::cat(
            FourCC::BLANK,
            vec![
                Chunk::form(FourCC(*b"ILBM"), vec![]).unwrap(),
                Chunk::form(FourCC(*b"ANIM"), vec![]).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(collect(&cat).0, QualityLevel::Perfect);
    }

    #[test]
    fn cat_member_type_mismatch_is_garbage() {
        let cat = Chunk::cat(
            FourCC(*b"ILBM"),
            vec![
                Chunk::form(FourCC(*b"ILBM"), vec![]).unwrap(),
                Chunk::form(FourCC(*b"ANIM"), vec![]).unwrap(),
            ],
        )
        .unwrap();
        let (level, messages) = collect(&cat);
        assert_eq!(level, QualityLevel::Garbage);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn raw_leaf_in_list_is_invalid() {
        let list = Chunk::list(
            FourCC(*b"ILBM"),
            vec![Chunk::raw(FourCC(*b"BODY"), vec![1]).unwrap()],
        )
        .unwrap();
        assert_eq!(collect(&list).0, QualityLevel::Invalid);
    }

    #[test]
    fn group_inside_prop_is_invalid() {
        let ilbm = FourCC(*b"ILBM");
        let list = Chunk::list(
            ilbm,
            vec![
                Chunk::prop(ilbm, vec![Chunk::form(ilbm, vec![]).unwrap()]).unwrap(),
                Chunk::form(ilbm, vec![]).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(collect(&list).0, QualityLevel::Invalid);
    }

    #[test]
    fn size_mismatch_is_invalid() {
        let mut form = Chunk::form(FourCC(*b"TEST"), vec![]).unwrap();
        form.size = 20;
        let (level, messages) = collect(&form);
        assert_eq!(level, QualityLevel::Invalid);
        assert!(messages[0].message.contains("differs from computed"));
    }

    #[test]
    fn prop_inside_form_is_invalid() {
        let ilbm = FourCC(*b"ILBM");
        let form = Chunk::form(ilbm, vec![Chunk::prop(ilbm, vec![]).unwrap()]).unwrap();
        assert_eq!(collect(&form).0, QualityLevel::Invalid);
    }

    #[test]
    fn quality_levels_order() {
        assert!(QualityLevel::Invalid < QualityLevel::Garbage);
        assert!(QualityLevel::Garbage < QualityLevel::Ok);
        assert!(QualityLevel::Ok < QualityLevel::Perfect);
        assert_eq!(
            QualityLevel::Perfect.min(QualityLevel::Garbage),
            QualityLevel::Garbage
        );
    }
}
