//! PDF transforms backed by `lopdf`.
//!
//! Each transform reads an uploaded input, writes a new file into the
//! artifact directory and reports its path and size. Parsing and saving are
//! blocking, so the work runs on the blocking pool.

use anyhow::{Result, anyhow, bail};
use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Balanced,
    Strong,
}

impl CompressionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Balanced => "balanced",
            CompressionLevel::Strong => "strong",
        }
    }
}

/// Page plan for a reorder. Indices are zero-based positions in the input.
#[derive(Debug, Clone, Default)]
pub struct ReorderPlan {
    pub new_order: Vec<u32>,
    pub rotations: HashMap<u32, i64>,
    pub deletions: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub path: PathBuf,
    pub size: u64,
}

pub struct PdfService {
    output_dir: PathBuf,
}

impl PdfService {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn output_path(&self, prefix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.pdf", prefix, uuid::Uuid::new_v4()))
    }

    pub async fn compress(&self, input: &Path, level: CompressionLevel) -> Result<TransformOutput> {
        let input = input.to_path_buf();
        let output = self.output_path("compressed");

        tokio::task::spawn_blocking(move || compress_blocking(&input, &output, level)).await?
    }

    pub async fn reorder(&self, input: &Path, plan: ReorderPlan) -> Result<TransformOutput> {
        let input = input.to_path_buf();
        let output = self.output_path("reordered");

        tokio::task::spawn_blocking(move || reorder_blocking(&input, &output, &plan)).await?
    }

    /// Concatenates every page of `inputs`, in order, into one document.
    pub async fn merge(&self, inputs: &[PathBuf]) -> Result<TransformOutput> {
        let inputs = inputs.to_vec();
        let output = self.output_path("merged");

        tokio::task::spawn_blocking(move || merge_blocking(&inputs, &output)).await?
    }

}

fn save(mut doc: Document, output: &Path) -> Result<TransformOutput> {
    doc.save(output)?;
    let size = std::fs::metadata(output)?.len();
    Ok(TransformOutput {
        path: output.to_path_buf(),
        size,
    })
}

fn compress_blocking(input: &Path, output: &Path, level: CompressionLevel) -> Result<TransformOutput> {
    let mut doc = Document::load(input)?;

    if level == CompressionLevel::Strong {
        doc.delete_zero_length_streams();
        doc.prune_objects();
        doc.renumber_objects();
    }
    doc.compress();

    save(doc, output)
}

fn pages_root(doc: &Document) -> Result<ObjectId> {
    let root = doc.trailer.get(b"Root")?.as_reference()?;
    Ok(doc.get_object(root)?.as_dict()?.get(b"Pages")?.as_reference()?)
}

/// Page attributes a page may take from an ancestor `Pages` node
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copies inherited attributes onto the page itself so it stays intact once
/// its intermediate `Pages` nodes are gone.
fn pin_inherited_attributes(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();
    {
        let page = doc.get_object(page_id)?.as_dict()?;
        let mut missing: Vec<&[u8]> = INHERITABLE_KEYS
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();

        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut visited = HashSet::new();

        while let Some(parent_id) = parent {
            if missing.is_empty() || !visited.insert(parent_id) {
                break;
            }
            let node = doc.get_object(parent_id)?.as_dict()?;
            missing.retain(|key| match node.get(key) {
                Ok(value) => {
                    inherited.push((*key, value.clone()));
                    false
                }
                Err(_) => true,
            });
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}

fn is_node_of_type(object: &Object, name: &[u8]) -> bool {
    object
        .as_dict()
        .ok()
        .and_then(|d| d.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
        .is_some_and(|t| t == name)
}

fn merge_blocking(inputs: &[PathBuf], output: &Path) -> Result<TransformOutput> {
    if inputs.is_empty() {
        bail!("No documents to merge");
    }

    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut kids = Vec::new();

    for input in inputs {
        let mut doc = Document::load(input)?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        for page_id in &page_ids {
            pin_inherited_attributes(&mut doc, *page_id)?;
            kids.push(*page_id);
        }

        // The source page trees and catalogs are replaced by a single new tree
        for (id, object) in doc.objects {
            if is_node_of_type(&object, b"Pages") || is_node_of_type(&object, b"Catalog") {
                continue;
            }
            merged.objects.insert(id, object);
        }
    }

    if kids.is_empty() {
        bail!("Merged document would have no pages");
    }

    merged.max_id = next_id;
    let pages_id = merged.new_object_id();
    for page_id in &kids {
        merged
            .get_object_mut(*page_id)?
            .as_dict_mut()?
            .set("Parent", Object::Reference(pages_id));
    }

    let mut pages = lopdf::Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set(
        "Kids",
        Object::Array(kids.into_iter().map(Object::Reference).collect()),
    );
    merged.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = lopdf::Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = merged.add_object(catalog);
    merged.trailer.set("Root", Object::Reference(catalog_id));

    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();

    save(merged, output)
}

fn reorder_blocking(input: &Path, output: &Path, plan: &ReorderPlan) -> Result<TransformOutput> {
    let mut doc = Document::load(input)?;
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    let deletions: HashSet<u32> = plan.deletions.iter().copied().collect();
    let kept: Vec<u32> = plan
        .new_order
        .iter()
        .copied()
        .filter(|i| !deletions.contains(i))
        .collect();

    if kept.is_empty() {
        bail!("Reorder would leave the document without pages");
    }

    let mut seen = HashSet::new();
    let mut kids = Vec::with_capacity(kept.len());
    let root = pages_root(&doc)?;

    for index in &kept {
        if !seen.insert(*index) {
            bail!("Page {} appears more than once", index);
        }
        let page_id = *page_ids
            .get(*index as usize)
            .ok_or_else(|| anyhow!("Page index {} out of range (0..{})", index, page_ids.len()))?;

        pin_inherited_attributes(&mut doc, page_id)?;

        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        // Flatten the page tree so every kept page hangs off the root node
        page.set("Parent", Object::Reference(root));

        let rotation = plan.rotations.get(index).copied().unwrap_or(0);
        if rotation != 0 {
            if rotation % 90 != 0 {
                bail!("Rotation for page {} must be a multiple of 90", index);
            }
            page.set("Rotate", Object::Integer(rotation.rem_euclid(360)));
        }

        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    let pages = doc.get_object_mut(root)?.as_dict_mut()?;
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", Object::Integer(count));

    doc.prune_objects();

    save(doc, output)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_compress_writes_output_in_artifact_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.pdf");
        write_sample_pdf(&input, 3);

        let service = PdfService::new(dir.path());
        for level in [CompressionLevel::Balanced, CompressionLevel::Strong] {
            let out = service.compress(&input, level).await.unwrap();
            assert_eq!(out.path.parent(), Some(dir.path()));
            assert!(
                out.path
                    .file_name()
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .starts_with("compressed_")
            );
            assert_eq!(out.size, std::fs::metadata(&out.path).unwrap().len());
            assert_eq!(page_widths(&out.path), vec![100, 101, 102]);
        }
    }

    #[tokio::test]
    async fn test_reorder_applies_order_deletions_and_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.pdf");
        write_sample_pdf(&input, 4);

        let service = PdfService::new(dir.path());
        let plan = ReorderPlan {
            new_order: vec![3, 1, 0, 2],
            rotations: HashMap::from([(1, 90)]),
            deletions: vec![0],
        };
        let out = service.reorder(&input, plan).await.unwrap();

        assert_eq!(page_widths(&out.path), vec![103, 101, 102]);

        let doc = Document::load(&out.path).unwrap();
        let second = *doc.get_pages().get(&2).unwrap();
        let rotate = doc
            .get_object(second)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Rotate")
            .unwrap()
            .as_i64()
            .unwrap();
        assert_eq!(rotate, 90);
    }

    #[tokio::test]
    async fn test_reorder_rejects_bad_plans() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.pdf");
        write_sample_pdf(&input, 2);
        let service = PdfService::new(dir.path());

        let out_of_range = ReorderPlan {
            new_order: vec![0, 5],
            ..Default::default()
        };
        assert!(service.reorder(&input, out_of_range).await.is_err());

        let everything_deleted = ReorderPlan {
            new_order: vec![0, 1],
            deletions: vec![0, 1],
            ..Default::default()
        };
        assert!(service.reorder(&input, everything_deleted).await.is_err());

        let duplicated = ReorderPlan {
            new_order: vec![0, 0],
            ..Default::default()
        };
        assert!(service.reorder(&input, duplicated).await.is_err());
    }

    #[tokio::test]
    async fn test_reorder_keeps_attributes_inherited_from_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("nested.pdf");
        write_nested_pdf(&input, 2);

        let service = PdfService::new(dir.path());
        let plan = ReorderPlan {
            new_order: vec![1, 0],
            ..Default::default()
        };
        let out = service.reorder(&input, plan).await.unwrap();

        assert_eq!(page_widths(&out.path), vec![300, 300]);
        let doc = Document::load(&out.path).unwrap();
        for id in doc.get_pages().values() {
            let page = doc.get_object(*id).unwrap().as_dict().unwrap();
            assert!(page.has(b"Resources"));
        }
    }

    #[tokio::test]
    async fn test_merge_concatenates_pages_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.pdf");
        let second = dir.path().join("second.pdf");
        write_sample_pdf(&first, 2);
        write_nested_pdf(&second, 3);

        let service = PdfService::new(dir.path());
        let out = service.merge(&[first, second]).await.unwrap();

        assert!(
            out.path
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("merged_")
        );
        assert_eq!(page_widths(&out.path), vec![100, 101, 300, 300, 300]);
    }

    #[tokio::test]
    async fn test_merge_without_inputs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let service = PdfService::new(dir.path());
        assert!(service.merge(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_non_pdf_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.pdf");
        std::fs::write(&input, b"definitely not a pdf").unwrap();

        let service = PdfService::new(dir.path());
        assert!(
            service
                .compress(&input, CompressionLevel::Balanced)
                .await
                .is_err()
        );
    }
}
