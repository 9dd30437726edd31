//! Page counting and page attribute lookup

use std::path::Path;
use lopdf::{Document, Object, ObjectId};
use crate::error::{Error, Result};
use crate::layout::PageBox;

/// Page attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Count pages by reading the Count field from the Pages dictionary
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog = doc.catalog()?;

    let pages_id = match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        Ok(_) => return Err(Error::General("Pages is not a reference".to_string())),
        Err(_) => return Err(Error::General("No Pages in catalog".to_string())),
    };

    let pages_dict = doc.get_dictionary(pages_id)?;

    match pages_dict.get(b"Count") {
        Ok(Object::Integer(n)) if *n >= 0 => Ok(*n as usize),
        Ok(_) => Err(Error::General("Count is not a non-negative integer".to_string())),
        Err(_) => Err(Error::General("No Count in Pages".to_string())),
    }
}

/// Count the number of pages in a PDF file
///
/// Reads the Count field of the page tree root; a document without
/// pages is an error.
pub fn count_pages(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = count_pages_from_catalog(&doc)?;

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(page_count)
}

/// Page object ids in document order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Follow a chain of references to a direct object
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object> {
    let mut current = object;
    // Bounded so a reference cycle cannot hang us
    for _ in 0..32 {
        match current {
            Object::Reference(id) => current = doc.get_object(*id)?,
            _ => return Ok(current),
        }
    }
    Err(Error::General("Reference chain too deep".to_string()))
}

/// Look up `key` on a page, walking up `/Parent` links when it is inherited
///
/// Returns the entry as stored (it may still be a reference).
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Result<Option<Object>> {
    let mut node_id = page_id;
    for _ in 0..64 {
        let node = doc.get_dictionary(node_id)?;
        if let Ok(value) = node.get(key) {
            return Ok(Some(value.clone()));
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node_id = *parent_id,
            _ => return Ok(None),
        }
    }
    Err(Error::General("Page tree too deep".to_string()))
}

/// A page's media box, inherited if necessary
///
/// Pages without any media box fall back to US Letter.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    match inherited_attribute(doc, page_id, b"MediaBox")? {
        Some(object) => PageBox::from_object(resolve(doc, &object)?),
        None => {
            log::warn!("page {:?} has no MediaBox, assuming US Letter", page_id);
            Ok(PageBox::letter())
        }
    }
}

/// A page's `/Rotate`, inherited if necessary, normalized to 0..360
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> Result<i64> {
    let rotation = match inherited_attribute(doc, page_id, b"Rotate")? {
        Some(object) => match resolve(doc, &object)? {
            Object::Integer(n) => *n,
            Object::Real(r) => *r as i64,
            _ => 0,
        },
        None => 0,
    };
    Ok(rotation.rem_euclid(360))
}

/// Copy inherited attributes onto the page itself
///
/// Required before a page is moved under a different parent.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut inherited = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        for key in INHERITABLE_KEYS {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(doc, page_id, key)? {
                inherited.push((key, value));
            }
        }
    }

    let page = doc.get_dictionary_mut(page_id)?;
    for (key, value) in inherited {
        page.set(key, value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Dictionary};

    /// Root Pages node carrying the MediaBox and Resources, one child Pages node, one page
    fn nested_tree() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let root_id = doc.new_object_id();
        let middle_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => middle_id,
        });
        doc.objects.insert(middle_id, Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => root_id,
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Rotate" => 90,
        }));
        doc.objects.insert(root_id, Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![middle_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => Dictionary::new(),
        }));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => root_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }

    #[test]
    fn test_media_box_is_inherited() {
        let (doc, page_id) = nested_tree();
        let page_box = media_box(&doc, page_id).unwrap();
        assert_eq!(page_box, PageBox::new(0.0, 0.0, 595.0, 842.0));
    }

    #[test]
    fn test_materialize_inherited_copies_attributes() {
        let (mut doc, page_id) = nested_tree();
        materialize_inherited(&mut doc, page_id).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
        assert_eq!(page.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
        assert!(!page.has(b"CropBox"));
    }

    #[test]
    fn test_page_rotation_is_inherited_and_normalized() {
        let (mut doc, page_id) = nested_tree();
        assert_eq!(page_rotation(&doc, page_id).unwrap(), 90);

        doc.get_dictionary_mut(page_id).unwrap().set("Rotate", -90);
        assert_eq!(page_rotation(&doc, page_id).unwrap(), 270);

        doc.get_dictionary_mut(page_id).unwrap().set("Rotate", 360);
        assert_eq!(page_rotation(&doc, page_id).unwrap(), 0);
    }

    #[test]
    fn test_page_ids_in_order() {
        let (doc, page_id) = nested_tree();
        assert_eq!(page_ids(&doc), vec![page_id]);
        assert_eq!(count_pages_from_catalog(&doc).unwrap(), 1);
    }
}
