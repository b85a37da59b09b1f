/// A parsed `CX:<manufacturerPartId>:<partInstanceId>` digital product
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductIdentifier {
    pub manufacturer_part_id: String,
    pub part_instance_id: String,
}

pub fn parse_identifier(raw: &str) -> Result<ProductIdentifier, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [prefix, manufacturer_part_id, part_instance_id] = parts.as_slice() else {
        return Err(format!("malformed digital product identifier: {raw}"));
    };
    if *prefix != "CX" || manufacturer_part_id.is_empty() || part_instance_id.is_empty() {
        return Err(format!("malformed digital product identifier: {raw}"));
    }
    Ok(ProductIdentifier {
        manufacturer_part_id: manufacturer_part_id.to_string(),
        part_instance_id: part_instance_id.to_string(),
    })
}
