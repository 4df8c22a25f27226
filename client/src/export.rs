use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Blob, BlobPropertyBag, Document, Event, HtmlAnchorElement, HtmlIFrameElement, Url};

use drawdeck_shared::{
    decode_board_file, encode_board_file, BoardFileData, Snapshot, SnapshotHistory,
};

/// File extension matching the snapshot's media type. Canvases usually emit
/// `image/png`, but a browser may hand back `image/jpeg` or `image/webp`.
pub fn image_extension(snapshot: &Snapshot) -> &str {
    match snapshot.media_type().strip_prefix("image/") {
        Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => ext,
        _ => "png",
    }
}

/// Triggers a browser download of the current raster image.
pub fn download_png(document: &Document, snapshot: &Snapshot, title: &str) {
    let anchor: HtmlAnchorElement = match document
        .create_element("a")
        .ok()
        .and_then(|element| element.dyn_into::<HtmlAnchorElement>().ok())
    {
        Some(anchor) => anchor,
        None => return,
    };
    anchor.set_href(snapshot.as_data_url());
    anchor.set_download(&format!(
        "{}.{}",
        safe_file_stem(title),
        image_extension(snapshot)
    ));
    anchor.click();
}

/// Triggers a download of the board in the native file format.
pub fn download_board_file(document: &Document, title: &str, snapshot: &Snapshot) {
    let data = BoardFileData {
        title: title.to_string(),
        snapshot: snapshot.as_data_url().to_string(),
    };
    let payload = encode_board_file(&data);
    let bytes = js_sys::Uint8Array::from(payload.as_slice());
    let parts = js_sys::Array::of1(&bytes);
    let options = BlobPropertyBag::new();
    options.set_type("application/octet-stream");
    let Ok(blob) = Blob::new_with_u8_array_sequence_and_options(&parts, &options) else {
        return;
    };
    let Ok(url) = Url::create_object_url_with_blob(&blob) else {
        return;
    };
    let anchor: HtmlAnchorElement = match document
        .create_element("a")
        .ok()
        .and_then(|element| element.dyn_into::<HtmlAnchorElement>().ok())
    {
        Some(anchor) => anchor,
        None => return,
    };
    anchor.set_href(&url);
    anchor.set_download(&format!("{}.ddb", safe_file_stem(title)));
    anchor.click();
    let _ = Url::revoke_object_url(&url);
}

/// Reads a board file picked by the user; resets the history to the loaded
/// raster as its single entry.
pub fn load_board_bytes(bytes: &[u8], history: &mut SnapshotHistory) -> Option<BoardFileData> {
    let data = decode_board_file(bytes).ok()?;
    let snapshot = Snapshot::from_data_url(data.snapshot.clone()).ok()?;
    *history = SnapshotHistory::with_default_capacity(snapshot);
    Some(data)
}

pub fn safe_file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "board".to_string()
    } else {
        stem
    }
}

/// Printable page embedding the raster; the browser's print dialog handles
/// the PDF step.
pub fn build_print_html(snapshot: &Snapshot, title: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\" /><title>{title}</title>\
<style>@page{{margin:0;size:auto;}}html,body{{margin:0;padding:0;}}\
img{{display:block;width:100vw;height:auto;}}</style></head>\
<body><img src=\"{src}\" alt=\"\" />\
<script>window.onload=()=>{{window.print();}}</script></body></html>",
        title = title,
        src = snapshot.as_data_url()
    )
}

pub fn open_print_window(document: &Document, html: &str) {
    let iframe: HtmlIFrameElement = match document
        .create_element("iframe")
        .ok()
        .and_then(|element| element.dyn_into::<HtmlIFrameElement>().ok())
    {
        Some(frame) => frame,
        None => return,
    };
    let _ = iframe.set_attribute(
        "style",
        "position:fixed;right:0;bottom:0;width:0;height:0;border:0;",
    );
    iframe.set_srcdoc(html);
    if let Some(body) = document.body() {
        let _ = body.append_child(&iframe);
    }
    let iframe_for_load = iframe.clone();
    let onload = Closure::<dyn FnMut(Event)>::new(move |_| {
        if let Some(window) = iframe_for_load.content_window() {
            let _ = window.focus();
            let _ = window.print();
        }
    });
    iframe.set_onload(Some(onload.as_ref().unchecked_ref()));
    onload.forget();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stems_strip_unsafe_characters() {
        assert_eq!(safe_file_stem("weekly / sync"), "weekly___sync");
        assert_eq!(safe_file_stem("   "), "board");
        assert_eq!(safe_file_stem("notes-2"), "notes-2");
    }

    #[test]
    fn board_bytes_round_trip_resets_history() {
        let snapshot = Snapshot::blank();
        let data = BoardFileData {
            title: "loaded".to_string(),
            snapshot: snapshot.as_data_url().to_string(),
        };
        let payload = encode_board_file(&data);

        let mut history = SnapshotHistory::with_default_capacity(Snapshot::blank());
        history.push(snapshot.clone());
        let loaded = load_board_bytes(&payload, &mut history).unwrap();
        assert_eq!(loaded.title, "loaded");
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
    }

    #[test]
    fn garbage_board_bytes_leave_history_alone() {
        let mut history = SnapshotHistory::with_default_capacity(Snapshot::blank());
        history.push(Snapshot::blank());
        assert!(load_board_bytes(b"not a board", &mut history).is_none());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn download_extension_follows_the_media_type() {
        assert_eq!(image_extension(&Snapshot::blank()), "png");
        let jpeg = Snapshot::from_data_url("data:image/jpeg;base64,aGk=").unwrap();
        assert_eq!(image_extension(&jpeg), "jpeg");
        let svg = Snapshot::from_data_url("data:image/svg+xml;base64,aGk=").unwrap();
        assert_eq!(image_extension(&svg), "png");
    }

    #[test]
    fn print_html_embeds_the_raster() {
        let html = build_print_html(&Snapshot::blank(), "demo");
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("window.print()"));
    }
}
