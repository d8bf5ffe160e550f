//! Minimal Gmsh 2.x ASCII reader
//!
//! Reads `$Nodes` and `$Elements`; everything else is skipped. Cube-type
//! elements are reordered from Gmsh's counter-clockwise numbering to the
//! lexicographic corner order used by [`UnstructuredMesh`](super::UnstructuredMesh).

use std::collections::HashMap;

use crate::domain::error::GridError;
use crate::domain::grid::ElementShape;

/// An element as read from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmshElement {
    pub shape: ElementShape,
    /// Topological dimension of the element
    pub dim: usize,
    /// Physical tag (0 if none)
    pub physical: usize,
    /// Indices into [`GmshMesh::nodes`]
    pub corners: Vec<usize>,
}

/// Raw mesh data from a Gmsh file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GmshMesh {
    pub nodes: Vec<[f64; 3]>,
    pub elements: Vec<GmshElement>,
}

impl GmshMesh {
    /// Elements of the given topological dimension.
    pub fn elements_of_dim(&self, dim: usize) -> impl Iterator<Item = &GmshElement> {
        self.elements.iter().filter(move |e| e.dim == dim)
    }
}

/// (shape, dimension, lexicographic corner order) for supported element types.
fn element_layout(kind: usize) -> Option<(ElementShape, usize, &'static [usize])> {
    match kind {
        1 => Some((ElementShape::Simplex, 1, &[0, 1])),
        2 => Some((ElementShape::Simplex, 2, &[0, 1, 2])),
        3 => Some((ElementShape::Cube, 2, &[0, 1, 3, 2])),
        4 => Some((ElementShape::Simplex, 3, &[0, 1, 2, 3])),
        5 => Some((ElementShape::Cube, 3, &[0, 1, 3, 2, 4, 5, 7, 6])),
        _ => None,
    }
}

/// Point elements carry no geometry we need.
const POINT_ELEMENT: usize = 15;

struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    line: usize,
    total: usize,
}

impl<'a> Lines<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            inner: content.lines().enumerate(),
            line: 0,
            total: content.lines().count(),
        }
    }

    /// Lines not yet consumed; bounds any count read from the file.
    fn remaining(&self) -> usize {
        self.total - self.line
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let (idx, text) = self.inner.next()?;
        self.line = idx + 1;
        Some(text.trim())
    }

    fn expect_line(&mut self, what: &str) -> Result<&'a str, GridError> {
        self.next_line().ok_or_else(|| self.error(format!("unexpected end of file, expected {}", what)))
    }

    fn expect_count(&mut self, what: &str) -> Result<usize, GridError> {
        let text = self.expect_line(what)?;
        text.parse()
            .map_err(|_| self.error(format!("expected {}, found '{}'", what, text)))
    }

    fn expect_end(&mut self, marker: &str) -> Result<(), GridError> {
        let text = self.expect_line(marker)?;
        if text == marker {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found '{}'", marker, text)))
        }
    }

    fn error(&self, message: String) -> GridError {
        GridError::MalformedMesh {
            line: self.line,
            message,
        }
    }
}

/// Parse Gmsh 2.x ASCII content.
pub fn parse(content: &str) -> Result<GmshMesh, GridError> {
    let mut lines = Lines::new(content);
    let mut mesh = GmshMesh::default();
    let mut node_map: HashMap<usize, usize> = HashMap::new();
    let mut saw_format = false;

    while let Some(line) = lines.next_line() {
        match line {
            "$MeshFormat" => {
                let header = lines.expect_line("mesh format header")?;
                let fields: Vec<&str> = header.split_whitespace().collect();
                let version = fields.first().and_then(|v| v.parse::<f64>().ok());
                match (version, fields.get(1)) {
                    (Some(v), Some(&"0")) if (2.0..3.0).contains(&v) => {}
                    _ => {
                        return Err(lines.error(format!(
                            "unsupported mesh format '{}', only ASCII version 2 is read",
                            header
                        )))
                    }
                }
                lines.expect_end("$EndMeshFormat")?;
                saw_format = true;
            }
            "$Nodes" => {
                let count = lines.expect_count("node count")?;
                mesh.nodes.reserve(count.min(lines.remaining()));
                for _ in 0..count {
                    let text = lines.expect_line("node")?;
                    let fields: Vec<&str> = text.split_whitespace().collect();
                    if fields.len() < 4 {
                        return Err(lines.error(format!("malformed node '{}'", text)));
                    }
                    let tag: usize = fields[0]
                        .parse()
                        .map_err(|_| lines.error(format!("bad node tag '{}'", fields[0])))?;
                    let mut xyz = [0.0; 3];
                    for (slot, field) in xyz.iter_mut().zip(&fields[1..4]) {
                        *slot = field
                            .parse()
                            .map_err(|_| lines.error(format!("bad coordinate '{}'", field)))?;
                    }
                    node_map.insert(tag, mesh.nodes.len());
                    mesh.nodes.push(xyz);
                }
                lines.expect_end("$EndNodes")?;
            }
            "$Elements" => {
                let count = lines.expect_count("element count")?;
                mesh.elements.reserve(count.min(lines.remaining()));
                for _ in 0..count {
                    let text = lines.expect_line("element")?;
                    if let Some(element) = parse_element(text, &node_map, &lines)? {
                        mesh.elements.push(element);
                    }
                }
                lines.expect_end("$EndElements")?;
            }
            "" => {}
            section if section.starts_with('$') && !section.starts_with("$End") => {
                let end = format!("$End{}", &section[1..]);
                loop {
                    match lines.next_line() {
                        Some(l) if l == end => break,
                        Some(_) => {}
                        None => return Err(lines.error(format!("missing {}", end))),
                    }
                }
            }
            other => return Err(lines.error(format!("unexpected content '{}'", other))),
        }
    }

    if !saw_format {
        return Err(GridError::MalformedMesh {
            line: 0,
            message: "missing $MeshFormat section".to_string(),
        });
    }
    if mesh.nodes.is_empty() {
        return Err(GridError::MalformedMesh {
            line: 0,
            message: "no nodes".to_string(),
        });
    }
    Ok(mesh)
}

fn parse_element(
    text: &str,
    node_map: &HashMap<usize, usize>,
    lines: &Lines<'_>,
) -> Result<Option<GmshElement>, GridError> {
    let fields: Vec<usize> = text
        .split_whitespace()
        .map(|f| f.parse())
        .collect::<Result<_, _>>()
        .map_err(|_| lines.error(format!("malformed element '{}'", text)))?;
    if fields.len() < 3 {
        return Err(lines.error(format!("malformed element '{}'", text)));
    }
    let kind = fields[1];
    let n_tags = fields[2];
    if kind == POINT_ELEMENT {
        return Ok(None);
    }
    let (shape, dim, order) = element_layout(kind)
        .ok_or_else(|| lines.error(format!("unsupported element type {}", kind)))?;

    let start = 3 + n_tags;
    let nodes = fields.get(start..).unwrap_or_default();
    if nodes.len() != order.len() {
        return Err(lines.error(format!(
            "element type {} needs {} nodes, found {}",
            kind,
            order.len(),
            nodes.len()
        )));
    }
    let corners = order
        .iter()
        .map(|&i| {
            node_map
                .get(&nodes[i])
                .copied()
                .ok_or_else(|| lines.error(format!("unknown node {}", nodes[i])))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let physical = if n_tags > 0 { fields[3] } else { 0 };

    Ok(Some(GmshElement {
        shape,
        dim,
        physical,
        corners,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "$MeshFormat\n2.2 0 8\n$EndMeshFormat\n\
$PhysicalNames\n1\n1 1 \"wall\"\n$EndPhysicalNames\n\
$Nodes\n4\n1 0 0 0\n2 1 0 0\n3 1 1 0\n4 0 1 0\n$EndNodes\n\
$Elements\n3\n1 1 2 1 1 1 2\n2 3 2 0 1 1 2 3 4\n3 15 2 0 1 1\n$EndElements\n";

    #[test]
    fn test_parse_reorders_quads_lexicographically() {
        let mesh = parse(SQUARE).unwrap();
        assert_eq!(mesh.nodes.len(), 4);
        let quads: Vec<_> = mesh.elements_of_dim(2).collect();
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].shape, ElementShape::Cube);
        assert_eq!(quads[0].corners, vec![0, 1, 3, 2]);
        let lines: Vec<_> = mesh.elements_of_dim(1).collect();
        assert_eq!(lines[0].physical, 1);
    }

    #[test]
    fn test_parse_rejects_binary_format() {
        let err = parse("$MeshFormat\n2.2 1 8\n$EndMeshFormat\n").unwrap_err();
        assert!(matches!(err, GridError::MalformedMesh { line: 2, .. }));
    }

    #[test]
    fn test_parse_rejects_count_beyond_file_length() {
        let text = SQUARE.replace("$Nodes\n4\n", &format!("$Nodes\n{}\n", usize::MAX));
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, GridError::MalformedMesh { .. }), "got {:?}", err);
    }

    #[test]
    fn test_parse_rejects_unknown_node_reference() {
        let text = SQUARE.replace("2 3 2 0 1 1 2 3 4", "2 3 2 0 1 1 2 3 9");
        assert!(parse(&text).is_err());
    }
}
