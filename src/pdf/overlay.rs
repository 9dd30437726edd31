//! Merging the hand-edited page back into the source document using lopdf

use std::collections::HashMap;
use std::path::Path;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use crate::error::{Error, Result};
use crate::layout::PageBox;
use super::pages::{inherited_attribute, materialize_inherited, media_box, page_ids, page_rotation, resolve};

/// Resource name the overlay is registered under (a digit is appended on clashes)
const OVERLAY_RESOURCE_NAME: &str = "SignedOverlay";

/// Which page to replace and which to drop, both 1-based in the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignPlan {
    pub edit_page: u32,
    pub delete_page: Option<u32>,
}

/// What happened to each source page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    Keep,
    Merge,
    Delete,
}

impl SignPlan {
    /// Decide the fate of the page at 0-based `index`
    ///
    /// An edit target that is also the delete target is merged, not deleted.
    pub fn action_for(&self, index: usize) -> PageAction {
        let is_edit = index + 1 == self.edit_page as usize;
        let is_delete = self.delete_page.map_or(false, |d| index + 1 == d as usize);

        match (is_edit, is_delete) {
            (true, _) => PageAction::Merge,
            (false, true) => PageAction::Delete,
            (false, false) => PageAction::Keep,
        }
    }

    /// True when the delete target collides with the edit target
    pub fn delete_overridden(&self) -> bool {
        self.delete_page == Some(self.edit_page)
    }
}

/// Outcome of assembling the signed document
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    /// Pages in the written document
    pub page_count: usize,
    /// Original and edited boxes, when the edited page had to be rescaled
    pub resized: Option<(PageBox, PageBox)>,
    /// Source page (1-based) that was removed
    pub deleted: Option<u32>,
}

/// Overlay the single page of `overlay_path` onto a page of `source_path`
///
/// The edited page is imported as a Form XObject drawn on top of the original
/// page content. If its media box differs from the original page's box it is
/// scaled to exactly the original width and height. The original page keeps
/// its own boxes. All other pages are copied unchanged except the delete
/// target. Nothing is written until the whole document has been assembled.
///
/// # Example
///
/// ```no_run
/// use pdf_sign::pdf::{sign_document, SignPlan};
/// use std::path::Path;
///
/// let plan = SignPlan { edit_page: 3, delete_page: Some(2) };
/// sign_document(
///     Path::new("contract.pdf"),
///     Path::new("/tmp/pdftoppm_temp.pdf"),
///     Path::new("contract.signed.pdf"),
///     &plan,
/// ).expect("Failed to sign");
/// ```
pub fn sign_document(
    source_path: &Path,
    overlay_path: &Path,
    output_path: &Path,
    plan: &SignPlan,
) -> Result<AssemblyReport> {
    for path in [source_path, overlay_path] {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
    }

    let mut doc = Document::load(source_path)?;
    let overlay_doc = Document::load(overlay_path)?;

    let source_pages = page_ids(&doc);
    if source_pages.is_empty() {
        return Err(Error::EmptyPdf(source_path.to_path_buf()));
    }
    check_page(plan.edit_page, source_pages.len())?;
    if let Some(delete_page) = plan.delete_page {
        check_page(delete_page, source_pages.len())?;
    }

    let overlay_pages = page_ids(&overlay_doc);
    if overlay_pages.len() != 1 {
        return Err(Error::UnexpectedPageCount {
            path: overlay_path.to_path_buf(),
            count: overlay_pages.len(),
        });
    }

    // Pages are about to be re-parented under a flat tree
    for &page_id in &source_pages {
        materialize_inherited(&mut doc, page_id)?;
    }

    let id_map = import_objects(&mut doc, &overlay_doc);
    let edited_page_id = id_map[&overlay_pages[0]];

    if plan.delete_overridden() {
        log::warn!(
            "page {} is both the page to edit and the page to delete; keeping the edited page",
            plan.edit_page
        );
    }

    let mut kept: Vec<ObjectId> = Vec::with_capacity(source_pages.len());
    let mut resized = None;
    let mut deleted = None;

    for (index, &page_id) in source_pages.iter().enumerate() {
        match plan.action_for(index) {
            PageAction::Keep => kept.push(page_id),
            PageAction::Delete => deleted = Some((index as u32 + 1, page_id)),
            PageAction::Merge => {
                resized = merge_page(&mut doc, page_id, edited_page_id)?;
                kept.push(page_id);
            }
        }
    }

    if let Some((number, page_id)) = deleted {
        log::debug!("removing page {}", number);
        remove_page(&mut doc, page_id);
    }

    rebuild_page_tree(&mut doc, &kept)?;
    doc.prune_objects();

    doc.compress();
    doc.save(output_path)?;

    Ok(AssemblyReport {
        page_count: kept.len(),
        resized,
        deleted: deleted.map(|(number, _)| number),
    })
}

fn check_page(page: u32, count: usize) -> Result<()> {
    if page == 0 {
        return Err(Error::InvalidPageNumber(page));
    }
    if page as usize > count {
        return Err(Error::PageOutOfRange { page, count });
    }
    Ok(())
}

/// Copy every object of `other` into `doc` under fresh ids
///
/// Returns the old-to-new id map. Objects that end up unreferenced
/// (the other document's catalog and page tree) are pruned before saving.
fn import_objects(doc: &mut Document, other: &Document) -> HashMap<ObjectId, ObjectId> {
    let id_offset = doc.max_id;

    let id_map: HashMap<ObjectId, ObjectId> = other
        .objects
        .keys()
        .map(|&old_id| (old_id, (old_id.0 + id_offset, old_id.1)))
        .collect();

    for (old_id, object) in other.objects.iter() {
        doc.objects.insert(id_map[old_id], renumber_object_references(object, &id_map));
    }

    doc.max_id = id_map
        .values()
        .map(|id| id.0)
        .max()
        .unwrap_or(id_offset)
        .max(id_offset);

    id_map
}

/// Renumber all object references in an object
fn renumber_object_references(object: &Object, id_map: &HashMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(old_id) => Object::Reference(*id_map.get(old_id).unwrap_or(old_id)),
        Object::Array(arr) => {
            Object::Array(arr.iter().map(|obj| renumber_object_references(obj, id_map)).collect())
        }
        Object::Dictionary(dict) => Object::Dictionary(renumber_dictionary(dict, id_map)),
        Object::Stream(stream) => {
            let mut stream = stream.clone();
            stream.dict = renumber_dictionary(&stream.dict, id_map);
            Object::Stream(stream)
        }
        _ => object.clone(),
    }
}

fn renumber_dictionary(dict: &Dictionary, id_map: &HashMap<ObjectId, ObjectId>) -> Dictionary {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        new_dict.set(key.clone(), renumber_object_references(value, id_map));
    }
    new_dict
}

/// Remove a page object and every reference to it
///
/// Outline and link destinations, annotation back-links and the old `Kids`
/// arrays would otherwise keep the page reachable through `prune_objects`.
fn remove_page(doc: &mut Document, page_id: ObjectId) {
    doc.objects.remove(&page_id);
    for object in doc.objects.values_mut() {
        if is_destination_of(object, page_id) {
            // Indirect destination object
            *object = Object::Null;
        } else {
            drop_references(object, page_id);
        }
    }
}

/// An explicit destination `[page /Fit ...]` aimed at `page_id`
fn is_destination_of(object: &Object, page_id: ObjectId) -> bool {
    match object {
        Object::Array(items) => matches!(items.first(), Some(Object::Reference(id)) if *id == page_id),
        _ => false,
    }
}

fn drop_references(object: &mut Object, page_id: ObjectId) {
    match object {
        Object::Array(items) => {
            items.retain(|item| !matches!(item, Object::Reference(id) if *id == page_id));
            for item in items.iter_mut() {
                if is_destination_of(item, page_id) {
                    // Name tree arrays are key/value pairs, so keep the slot
                    *item = Object::Null;
                } else {
                    drop_references(item, page_id);
                }
            }
        }
        Object::Dictionary(dict) => drop_dictionary_references(dict, page_id),
        Object::Stream(stream) => drop_dictionary_references(&mut stream.dict, page_id),
        _ => {}
    }
}

fn drop_dictionary_references(dict: &mut Dictionary, page_id: ObjectId) {
    let dangling: Vec<Vec<u8>> = dict
        .iter()
        .filter(|(_, value)| {
            matches!(value, Object::Reference(id) if *id == page_id) || is_destination_of(value, page_id)
        })
        .map(|(key, _)| key.clone())
        .collect();

    for key in dangling {
        dict.remove(&key);
    }
    for (_, value) in dict.iter_mut() {
        drop_references(value, page_id);
    }
}

/// Draw the edited page on top of `page_id`
///
/// Returns the (original, edited) boxes when the edited page was rescaled.
fn merge_page(
    doc: &mut Document,
    page_id: ObjectId,
    edited_page_id: ObjectId,
) -> Result<Option<(PageBox, PageBox)>> {
    let original_box = media_box(doc, page_id)?;
    let edited_box = media_box(doc, edited_page_id)?;

    let rotation = page_rotation(doc, page_id)?;
    if rotation != 0 {
        log::warn!(
            "page is rotated by {} degrees; the signature is placed in unrotated page space and may appear turned",
            rotation
        );
    }

    let resized = if original_box.approx_eq(&edited_box) {
        None
    } else {
        log::info!("size changed from {} to {}, fixing...", original_box, edited_box);
        Some((original_box, edited_box))
    };

    let xobject_id = create_page_xobject(doc, edited_page_id, &edited_box, &original_box)?;
    let name = add_xobject_to_page_resources(doc, page_id, xobject_id)?;

    // Isolate the original content so a dangling cm or clip cannot leak into the overlay
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    let invoke = format!("q\n/{} Do\nQ\n", name);
    let invoke_id = doc.add_object(Stream::new(Dictionary::new(), invoke.into_bytes()));

    let mut contents = vec![Object::Reference(save_id)];
    contents.extend(doc.get_page_contents(page_id).into_iter().map(Object::Reference));
    contents.push(Object::Reference(restore_id));
    contents.push(Object::Reference(invoke_id));

    doc.get_dictionary_mut(page_id)?.set("Contents", Object::Array(contents));

    Ok(resized)
}

/// Wrap a page's content and resources in a Form XObject
///
/// The form's BBox is the page's own box; its Matrix maps that box onto `target`.
fn create_page_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    page_box: &PageBox,
    target: &PageBox,
) -> Result<ObjectId> {
    let content = doc.get_page_content(page_id)?;

    let resources = match inherited_attribute(doc, page_id, b"Resources")? {
        Some(res) => resolve(doc, &res)?.clone(),
        None => Object::Dictionary(Dictionary::new()),
    };

    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));
    xobject_dict.set("BBox", page_box.to_object());
    xobject_dict.set("Matrix", page_box.fit_onto(target).to_object());
    xobject_dict.set("Resources", resources);

    let xobject_id = doc.add_object(Object::Stream(Stream::new(xobject_dict, content)));
    Ok(xobject_id)
}

/// Register the XObject in the page's Resources, returning the name it got
///
/// The page receives its own copy of the Resources dictionary so pages
/// sharing a Resources object are not affected.
fn add_xobject_to_page_resources(doc: &mut Document, page_id: ObjectId, xobject_id: ObjectId) -> Result<String> {
    let mut resources = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(res) => match resolve(doc, res)? {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };

    let mut xobjects = match resources.get(b"XObject") {
        Ok(xo) => match resolve(doc, xo)? {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };

    let mut name = OVERLAY_RESOURCE_NAME.to_string();
    let mut suffix = 1;
    while xobjects.has(name.as_bytes()) {
        name = format!("{}{}", OVERLAY_RESOURCE_NAME, suffix);
        suffix += 1;
    }

    xobjects.set(name.as_bytes(), Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_dictionary_mut(page_id)?.set("Resources", Object::Dictionary(resources));

    Ok(name)
}

/// Point the catalog at a new flat page tree holding `page_ids` in order
fn rebuild_page_tree(doc: &mut Document, page_ids: &[ObjectId]) -> Result<()> {
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = page_ids
        .iter()
        .map(|&id| Object::Reference(id))
        .collect();

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(page_ids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_object));

    for &page_id in page_ids {
        doc.get_dictionary_mut(page_id)?.set("Parent", Object::Reference(pages_id));
    }

    let catalog_id = match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => *id,
        _ => return Err(Error::General("Root is not a reference".to_string())),
    };
    doc.get_dictionary_mut(catalog_id)?.set("Pages", Object::Reference(pages_id));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_plan_keeps_and_merges() {
        let plan = SignPlan { edit_page: 3, delete_page: None };
        let actions: Vec<PageAction> = (0..5).map(|i| plan.action_for(i)).collect();
        assert_eq!(
            actions,
            [PageAction::Keep, PageAction::Keep, PageAction::Merge, PageAction::Keep, PageAction::Keep]
        );
    }

    #[test]
    fn test_plan_deletes_other_page() {
        let plan = SignPlan { edit_page: 3, delete_page: Some(2) };
        assert_eq!(plan.action_for(1), PageAction::Delete);
        assert_eq!(plan.action_for(2), PageAction::Merge);
        assert!(!plan.delete_overridden());
    }

    #[test]
    fn test_plan_edit_wins_over_delete() {
        let plan = SignPlan { edit_page: 2, delete_page: Some(2) };
        assert_eq!(plan.action_for(1), PageAction::Merge);
        assert!(plan.delete_overridden());
    }

    #[test]
    fn test_check_page_bounds() {
        assert!(matches!(check_page(0, 5), Err(Error::InvalidPageNumber(0))));
        assert!(matches!(check_page(6, 5), Err(Error::PageOutOfRange { page: 6, count: 5 })));
        assert!(check_page(5, 5).is_ok());
    }

    #[test]
    fn test_drop_references_to_removed_page() {
        let page = (7, 0);
        let mut outline_item = Object::Dictionary(dictionary! {
            "Title" => Object::string_literal("Appendix"),
            "Dest" => vec![Object::Reference(page), "Fit".into()],
            "Next" => Object::Reference((8, 0)),
        });
        drop_references(&mut outline_item, page);
        let item = outline_item.as_dict().unwrap();
        assert!(!item.has(b"Dest"));
        assert!(item.has(b"Next"));

        let mut names = Object::Array(vec![
            Object::string_literal("appendix"),
            Object::Array(vec![Object::Reference(page), "Fit".into()]),
            Object::string_literal("intro"),
            Object::Array(vec![Object::Reference((3, 0)), "Fit".into()]),
        ]);
        drop_references(&mut names, page);
        let names = names.as_array().unwrap();
        assert_eq!(names.len(), 4);
        assert_eq!(names[1], Object::Null);
        assert!(is_destination_of(&names[3], (3, 0)));

        let mut kids = Object::Array(vec![Object::Reference((3, 0)), Object::Reference(page)]);
        drop_references(&mut kids, page);
        assert_eq!(kids.as_array().unwrap(), &vec![Object::Reference((3, 0))]);
    }

    #[test]
    fn test_renumber_nested_references() {
        let mut id_map = HashMap::new();
        id_map.insert((1, 0), (11, 0));

        let mut dict = Dictionary::new();
        dict.set("Kids", Object::Array(vec![Object::Reference((1, 0)), Object::Reference((2, 0))]));
        let renumbered = renumber_object_references(&Object::Dictionary(dict), &id_map);

        let kids = renumbered.as_dict().unwrap().get(b"Kids").unwrap().as_array().unwrap();
        assert_eq!(kids[0].as_reference().unwrap(), (11, 0));
        assert_eq!(kids[1].as_reference().unwrap(), (2, 0));
    }
}
