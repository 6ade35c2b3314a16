use crate::api::TransferItem;
use crate::error::InvalidTransferSpecification;

/// Parse a `source:destination` pair.
///
/// Both paths ending in `/` is a recursive directory transfer, neither is a
/// file transfer; anything else is rejected.
pub fn parse(spec: &str) -> Result<TransferItem, InvalidTransferSpecification> {
    let invalid = |reason| InvalidTransferSpecification {
        spec: spec.to_string(),
        reason,
    };

    let mut parts = spec.split(':');
    let (src, dst) = match (parts.next(), parts.next(), parts.next()) {
        (Some(src), Some(dst), None) => (src, dst),
        _ => return Err(invalid("expected exactly one ':' between source and destination")),
    };
    if src.is_empty() || dst.is_empty() {
        return Err(invalid("source and destination must not be empty"));
    }

    let recursive = match (src.ends_with('/'), dst.ends_with('/')) {
        (true, true) => true,
        (false, false) => false,
        _ => {
            return Err(invalid(
                "if transferring directories, both paths must end with /",
            ))
        }
    };

    if recursive {
        tracing::debug!("Transfer directory {src} -> {dst}");
    } else {
        tracing::debug!("Transfer file {src} -> {dst}");
    }

    Ok(TransferItem {
        source_path: src.to_string(),
        destination_path: dst.to_string(),
        recursive,
    })
}

/// Parse every spec, failing on the first invalid one.
pub fn parse_all(specs: &[String]) -> Result<Vec<TransferItem>, InvalidTransferSpecification> {
    specs.iter().map(|spec| parse(spec)).collect()
}
