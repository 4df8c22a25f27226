use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, Event, FileReader, HtmlButtonElement,
    HtmlCanvasElement, HtmlInputElement, HtmlSelectElement, HtmlSpanElement, KeyboardEvent,
    PointerEvent, ProgressEvent, Window,
};

use drawdeck_shared::{DiagramRecord, SaveDiagramRequest, Snapshot, SnapshotHistory};

use crate::actions::{clear_board, pointer_down, pointer_move, pointer_up, redo, undo};
use crate::dom::{
    event_to_point, get_element, set_canvas_cursor, set_status, set_tool_button, update_size_label,
};
use crate::export::{
    build_print_html, download_board_file, download_png, load_board_bytes, open_print_window,
};
use crate::net;
use crate::render::{capture_snapshot, clear_surface, restore_snapshot};
use crate::state::{AuthSession, PointerState, State, Tool, DEFAULT_COLOR, DEFAULT_SIZE};

#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document"))?;

    let canvas: HtmlCanvasElement = get_element(&document, "board")?;
    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("No 2d context"))?
        .dyn_into::<CanvasRenderingContext2d>()?;

    let rect = canvas.get_bounding_client_rect();
    canvas.set_width(rect.width().max(1.0) as u32);
    canvas.set_height(rect.height().max(1.0) as u32);
    let board_width = canvas.width() as f64;
    let board_height = canvas.height() as f64;
    clear_surface(&ctx, board_width, board_height);

    // Seed the history with the rendered blank surface so the first undo has
    // a well-defined floor.
    let blank = canvas
        .to_data_url()
        .ok()
        .and_then(|url| Snapshot::from_data_url(url).ok())
        .unwrap_or_else(Snapshot::blank);

    let state = Rc::new(RefCell::new(State {
        canvas: canvas.clone(),
        ctx,
        history: SnapshotHistory::with_default_capacity(blank),
        tool: Tool::Brush,
        color: DEFAULT_COLOR.to_string(),
        size: DEFAULT_SIZE,
        board_width,
        board_height,
        pointer: PointerState::Idle,
        shape_base: None,
        render_epoch: 0,
        auth: None,
        diagrams: Vec::new(),
        open_diagram: None,
    }));

    let status: Element = get_element(&document, "status")?;
    let diagram_list: HtmlSelectElement = get_element(&document, "diagram-list")?;
    let title_input: HtmlInputElement = get_element(&document, "diagram-title")?;

    wire_pointer_events(&window, &canvas, &state)?;
    wire_toolbar(&document, &state)?;
    wire_history_buttons(&window, &document, &state)?;
    wire_export(&document, &state, &title_input)?;
    wire_board_file(&document, &state, &title_input, &status)?;
    wire_auth(&window, &document, &state, &diagram_list, &status)?;
    wire_diagrams(
        &window,
        &document,
        &state,
        &diagram_list,
        &title_input,
        &status,
    )?;
    wire_resize(&window, &state)?;

    set_status(&status, "ready", "Ready");
    Ok(())
}

fn wire_pointer_events(
    window: &Window,
    canvas: &HtmlCanvasElement,
    state: &Rc<RefCell<State>>,
) -> Result<(), JsValue> {
    {
        let down_state = state.clone();
        let down_canvas = canvas.clone();
        let onpointerdown = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if event.button() != 0 {
                return;
            }
            event.prevent_default();
            if let Some(point) = event_to_point(&down_canvas, &event) {
                pointer_down(&mut down_state.borrow_mut(), point);
            }
        });
        canvas.add_event_listener_with_callback(
            "pointerdown",
            onpointerdown.as_ref().unchecked_ref(),
        )?;
        onpointerdown.forget();
    }
    {
        let move_state = state.clone();
        let move_canvas = canvas.clone();
        let onpointermove = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if let Some(point) = event_to_point(&move_canvas, &event) {
                pointer_move(&mut move_state.borrow_mut(), point);
            }
        });
        canvas.add_event_listener_with_callback(
            "pointermove",
            onpointermove.as_ref().unchecked_ref(),
        )?;
        onpointermove.forget();
    }
    {
        // On the window so releases outside the canvas still finalize.
        let up_state = state.clone();
        let up_canvas = canvas.clone();
        let onpointerup = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            let point = match event_to_point(&up_canvas, &event) {
                Some(point) => point,
                None => return,
            };
            pointer_up(&mut up_state.borrow_mut(), point);
        });
        window
            .add_event_listener_with_callback("pointerup", onpointerup.as_ref().unchecked_ref())?;
        onpointerup.forget();
    }
    Ok(())
}

fn wire_toolbar(document: &Document, state: &Rc<RefCell<State>>) -> Result<(), JsValue> {
    let tools: [(&str, Tool); 5] = [
        ("tool-brush", Tool::Brush),
        ("tool-eraser", Tool::Eraser),
        ("tool-line", Tool::Line),
        ("tool-rect", Tool::Rect),
        ("tool-ellipse", Tool::Ellipse),
    ];
    let buttons: Vec<(HtmlButtonElement, Tool)> = tools
        .iter()
        .map(|(id, tool)| get_element::<HtmlButtonElement>(document, id).map(|b| (b, *tool)))
        .collect::<Result<_, _>>()?;

    for (button, tool) in &buttons {
        let tool = *tool;
        let click_state = state.clone();
        let all_buttons: Vec<(HtmlButtonElement, Tool)> = buttons.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let mut state = click_state.borrow_mut();
            state.tool = tool;
            state.pointer = PointerState::Idle;
            state.shape_base = None;
            for (other, other_tool) in &all_buttons {
                set_tool_button(other, *other_tool == tool);
            }
            set_canvas_cursor(&state.canvas, tool);
        });
        button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    set_tool_button(&buttons[0].0, true);

    let color_input: HtmlInputElement = get_element(document, "color")?;
    color_input.set_value(DEFAULT_COLOR);
    {
        let color_state = state.clone();
        let input = color_input.clone();
        let oninput = Closure::<dyn FnMut()>::new(move || {
            color_state.borrow_mut().color = input.value();
        });
        color_input.add_event_listener_with_callback("input", oninput.as_ref().unchecked_ref())?;
        oninput.forget();
    }

    let size_input: HtmlInputElement = get_element(document, "size")?;
    let size_value: HtmlSpanElement = get_element(document, "size-value")?;
    update_size_label(&size_input, &size_value);
    {
        let size_state = state.clone();
        let input = size_input.clone();
        let label = size_value.clone();
        let oninput = Closure::<dyn FnMut()>::new(move || {
            update_size_label(&input, &label);
            if let Ok(size) = input.value().parse::<f64>() {
                size_state.borrow_mut().size = size.clamp(1.0, 60.0);
            }
        });
        size_input.add_event_listener_with_callback("input", oninput.as_ref().unchecked_ref())?;
        oninput.forget();
    }
    Ok(())
}

fn wire_history_buttons(
    window: &Window,
    document: &Document,
    state: &Rc<RefCell<State>>,
) -> Result<(), JsValue> {
    let undo_button: HtmlButtonElement = get_element(document, "undo")?;
    let redo_button: HtmlButtonElement = get_element(document, "redo")?;
    let clear_button: HtmlButtonElement = get_element(document, "clear")?;

    {
        let undo_state = state.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || undo(&undo_state));
        undo_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let redo_state = state.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || redo(&redo_state));
        redo_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let clear_state = state.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            clear_board(&mut clear_state.borrow_mut());
        });
        clear_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let key_state = state.clone();
        let onkeydown = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
            if !(event.ctrl_key() || event.meta_key()) {
                return;
            }
            match event.key().as_str() {
                "z" | "Z" => {
                    event.prevent_default();
                    if event.shift_key() {
                        redo(&key_state);
                    } else {
                        undo(&key_state);
                    }
                }
                "y" | "Y" => {
                    event.prevent_default();
                    redo(&key_state);
                }
                _ => {}
            }
        });
        window.add_event_listener_with_callback("keydown", onkeydown.as_ref().unchecked_ref())?;
        onkeydown.forget();
    }
    Ok(())
}

fn wire_export(
    document: &Document,
    state: &Rc<RefCell<State>>,
    title_input: &HtmlInputElement,
) -> Result<(), JsValue> {
    let png_button: HtmlButtonElement = get_element(document, "export-png")?;
    let pdf_button: HtmlButtonElement = get_element(document, "export-pdf")?;
    let board_button: HtmlButtonElement = get_element(document, "board-download")?;

    {
        let png_state = state.clone();
        let doc = document.clone();
        let title = title_input.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let state = png_state.borrow();
            if let Some(snapshot) = capture_snapshot(&state) {
                download_png(&doc, &snapshot, &title.value());
            }
        });
        png_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let pdf_state = state.clone();
        let doc = document.clone();
        let title = title_input.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let state = pdf_state.borrow();
            if let Some(snapshot) = capture_snapshot(&state) {
                let html = build_print_html(&snapshot, &title.value());
                open_print_window(&doc, &html);
            }
        });
        pdf_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let board_state = state.clone();
        let doc = document.clone();
        let title = title_input.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let state = board_state.borrow();
            if let Some(snapshot) = capture_snapshot(&state) {
                download_board_file(&doc, &title.value(), &snapshot);
            }
        });
        board_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    Ok(())
}

fn wire_board_file(
    document: &Document,
    state: &Rc<RefCell<State>>,
    title_input: &HtmlInputElement,
    status: &Element,
) -> Result<(), JsValue> {
    let file_input: HtmlInputElement = get_element(document, "board-open")?;
    let change_state = state.clone();
    let change_title = title_input.clone();
    let change_status = status.clone();
    let input_for_change = file_input.clone();
    let onchange = Closure::<dyn FnMut(Event)>::new(move |_| {
        let Some(file) = input_for_change.files().and_then(|files| files.get(0)) else {
            return;
        };
        let reader = match FileReader::new() {
            Ok(reader) => reader,
            Err(_) => return,
        };
        let reader_for_load = reader.clone();
        let state_rc = change_state.clone();
        let title = change_title.clone();
        let status = change_status.clone();
        let onload = Closure::<dyn FnMut(ProgressEvent)>::new(move |_| {
            let Ok(result) = reader_for_load.result() else {
                return;
            };
            let bytes = js_sys::Uint8Array::new(&result).to_vec();
            let loaded = {
                let mut state = state_rc.borrow_mut();
                load_board_bytes(&bytes, &mut state.history)
            };
            match loaded {
                Some(data) => {
                    // Only a successfully loaded file detaches the board from
                    // its server-side diagram.
                    state_rc.borrow_mut().open_diagram = None;
                    title.set_value(&data.title);
                    let snapshot = state_rc.borrow().history.visible().clone();
                    restore_snapshot(&state_rc, &snapshot);
                    set_status(&status, "ok", "Board loaded");
                }
                None => set_status(&status, "error", "Not a board file"),
            }
        });
        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();
        let _ = reader.read_as_array_buffer(&file);
    });
    file_input.add_event_listener_with_callback("change", onchange.as_ref().unchecked_ref())?;
    onchange.forget();
    Ok(())
}

fn wire_auth(
    window: &Window,
    document: &Document,
    state: &Rc<RefCell<State>>,
    diagram_list: &HtmlSelectElement,
    status: &Element,
) -> Result<(), JsValue> {
    let username_input: HtmlInputElement = get_element(document, "username")?;
    let password_input: HtmlInputElement = get_element(document, "password")?;
    let login_button: HtmlButtonElement = get_element(document, "login")?;
    let register_button: HtmlButtonElement = get_element(document, "register")?;
    let logout_button: HtmlButtonElement = get_element(document, "logout")?;

    {
        let win = window.clone();
        let doc = document.clone();
        let login_state = state.clone();
        let username = username_input.clone();
        let password = password_input.clone();
        let list = diagram_list.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let name = username.value();
            let pass = password.value();
            let win_inner = win.clone();
            let doc_inner = doc.clone();
            let state_rc = login_state.clone();
            let list = list.clone();
            let status = status.clone();
            let name_for_session = name.clone();
            net::login(&win, &name, &pass, move |result| match result {
                Ok(token) => {
                    state_rc.borrow_mut().auth = Some(AuthSession {
                        username: name_for_session.clone(),
                        token: token.token,
                    });
                    set_status(&status, "ok", &format!("Signed in as {name_for_session}"));
                    refresh_diagrams(&win_inner, &doc_inner, &state_rc, &list, &status);
                }
                Err(detail) => set_status(&status, "error", &detail),
            });
        });
        login_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let win = window.clone();
        let username = username_input.clone();
        let password = password_input.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let status = status.clone();
            net::register(&win, &username.value(), &password.value(), move |result| {
                match result {
                    Ok(()) => set_status(&status, "ok", "Registered, you can sign in now"),
                    Err(detail) => set_status(&status, "error", &detail),
                }
            });
        });
        register_button
            .add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let logout_state = state.clone();
        let list = diagram_list.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let mut state = logout_state.borrow_mut();
            state.auth = None;
            state.diagrams.clear();
            state.open_diagram = None;
            list.set_inner_html("");
            set_status(&status, "ready", "Signed out");
        });
        logout_button
            .add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    Ok(())
}

fn wire_diagrams(
    window: &Window,
    document: &Document,
    state: &Rc<RefCell<State>>,
    diagram_list: &HtmlSelectElement,
    title_input: &HtmlInputElement,
    status: &Element,
) -> Result<(), JsValue> {
    let save_button: HtmlButtonElement = get_element(document, "diagram-save")?;
    let load_button: HtmlButtonElement = get_element(document, "diagram-load")?;
    let rename_button: HtmlButtonElement = get_element(document, "diagram-rename")?;
    let delete_button: HtmlButtonElement = get_element(document, "diagram-delete")?;
    let refresh_button: HtmlButtonElement = get_element(document, "diagram-refresh")?;

    {
        let win = window.clone();
        let doc = document.clone();
        let save_state = state.clone();
        let title = title_input.clone();
        let list = diagram_list.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let session = {
                let state = save_state.borrow();
                state
                    .auth
                    .as_ref()
                    .map(|auth| (auth.token.clone(), auth.username.clone(), state.open_diagram))
            };
            let Some((token, username, open_id)) = session else {
                set_status(&status, "error", "Sign in to save diagrams");
                return;
            };
            let snapshot = {
                let state = save_state.borrow();
                capture_snapshot(&state)
            };
            let Some(snapshot) = snapshot else {
                set_status(&status, "error", "Could not capture the board");
                return;
            };
            let title_value = title.value();
            let request = SaveDiagramRequest {
                username,
                title: (!title_value.trim().is_empty()).then_some(title_value),
                content: snapshot.as_data_url().to_string(),
                id: open_id,
            };
            let win_inner = win.clone();
            let doc_inner = doc.clone();
            let state_rc = save_state.clone();
            let list = list.clone();
            let status = status.clone();
            net::save_diagram(&win, &token, &request, move |result| match result {
                Ok(saved) => {
                    state_rc.borrow_mut().open_diagram = Some(saved.id);
                    set_status(&status, "ok", &saved.msg);
                    refresh_diagrams(&win_inner, &doc_inner, &state_rc, &list, &status);
                }
                Err(detail) => set_status(&status, "error", &detail),
            });
        });
        save_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let load_state = state.clone();
        let list = diagram_list.clone();
        let title = title_input.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let Some(id) = selected_diagram_id(&list) else {
                return;
            };
            let record = load_state
                .borrow()
                .diagrams
                .iter()
                .find(|diagram| diagram.id == id)
                .cloned();
            let Some(record) = record else {
                return;
            };
            let Ok(snapshot) = Snapshot::from_data_url(record.content.clone()) else {
                set_status(&status, "error", "Stored diagram is not an image");
                return;
            };
            {
                let mut state = load_state.borrow_mut();
                state.history = SnapshotHistory::with_default_capacity(snapshot.clone());
                state.open_diagram = Some(id);
            }
            title.set_value(&record.title);
            restore_snapshot(&load_state, &snapshot);
            set_status(&status, "ok", &format!("Opened \"{}\"", record.title));
        });
        load_button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let win = window.clone();
        let doc = document.clone();
        let rename_state = state.clone();
        let list = diagram_list.clone();
        let title = title_input.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let Some(id) = selected_diagram_id(&list) else {
                return;
            };
            let token = match &rename_state.borrow().auth {
                Some(auth) => auth.token.clone(),
                None => return,
            };
            let new_title = title.value();
            if new_title.trim().is_empty() {
                set_status(&status, "error", "Enter a title first");
                return;
            }
            let win_inner = win.clone();
            let doc_inner = doc.clone();
            let state_rc = rename_state.clone();
            let list = list.clone();
            let status = status.clone();
            net::rename_diagram(&win, &token, id, &new_title, move |result| match result {
                Ok(()) => {
                    set_status(&status, "ok", "Diagram renamed");
                    refresh_diagrams(&win_inner, &doc_inner, &state_rc, &list, &status);
                }
                Err(detail) => set_status(&status, "error", &detail),
            });
        });
        rename_button
            .add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let win = window.clone();
        let doc = document.clone();
        let delete_state = state.clone();
        let list = diagram_list.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            let Some(id) = selected_diagram_id(&list) else {
                return;
            };
            let token = match &delete_state.borrow().auth {
                Some(auth) => auth.token.clone(),
                None => return,
            };
            let win_inner = win.clone();
            let doc_inner = doc.clone();
            let state_rc = delete_state.clone();
            let list = list.clone();
            let status = status.clone();
            net::delete_diagram(&win, &token, id, move |result| match result {
                Ok(()) => {
                    let mut state = state_rc.borrow_mut();
                    if state.open_diagram == Some(id) {
                        state.open_diagram = None;
                    }
                    drop(state);
                    set_status(&status, "ok", "Diagram deleted");
                    refresh_diagrams(&win_inner, &doc_inner, &state_rc, &list, &status);
                }
                Err(detail) => set_status(&status, "error", &detail),
            });
        });
        delete_button
            .add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    {
        let win = window.clone();
        let doc = document.clone();
        let refresh_state = state.clone();
        let list = diagram_list.clone();
        let status = status.clone();
        let onclick = Closure::<dyn FnMut()>::new(move || {
            refresh_diagrams(&win, &doc, &refresh_state, &list, &status);
        });
        refresh_button
            .add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }
    Ok(())
}

fn wire_resize(window: &Window, state: &Rc<RefCell<State>>) -> Result<(), JsValue> {
    let resize_state = state.clone();
    let onresize = Closure::<dyn FnMut()>::new(move || {
        let snapshot = {
            let mut state = resize_state.borrow_mut();
            let rect = state.canvas.get_bounding_client_rect();
            state.canvas.set_width(rect.width().max(1.0) as u32);
            state.canvas.set_height(rect.height().max(1.0) as u32);
            state.board_width = state.canvas.width() as f64;
            state.board_height = state.canvas.height() as f64;
            state.history.visible().clone()
        };
        restore_snapshot(&resize_state, &snapshot);
    });
    window.add_event_listener_with_callback("resize", onresize.as_ref().unchecked_ref())?;
    onresize.forget();
    Ok(())
}

fn selected_diagram_id(list: &HtmlSelectElement) -> Option<u64> {
    list.value().parse().ok()
}

fn refresh_diagrams(
    window: &Window,
    document: &Document,
    state: &Rc<RefCell<State>>,
    list: &HtmlSelectElement,
    status: &Element,
) {
    let session = state
        .borrow()
        .auth
        .as_ref()
        .map(|auth| (auth.token.clone(), auth.username.clone()));
    let Some((token, username)) = session else {
        return;
    };
    let state_rc = state.clone();
    let list = list.clone();
    let document = document.clone();
    let status = status.clone();
    net::get_diagrams(window, &token, &username, move |result| match result {
        Ok(diagrams) => {
            populate_diagram_list(&document, &list, &diagrams);
            state_rc.borrow_mut().diagrams = diagrams;
        }
        Err(detail) => set_status(&status, "error", &detail),
    });
}

fn populate_diagram_list(document: &Document, list: &HtmlSelectElement, diagrams: &[DiagramRecord]) {
    list.set_inner_html("");
    for diagram in diagrams {
        if let Ok(option) = document.create_element("option") {
            let _ = option.set_attribute("value", &diagram.id.to_string());
            option.set_text_content(Some(&format!("{} (#{})", diagram.title, diagram.id)));
            let _ = list.append_child(&option);
        }
    }
}
