#![cfg(target_arch = "wasm32")]

use stagger_web::{
	view::{element, navigation_link, View},
	web::{materialize, mount},
};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlBodyElement};

wasm_bindgen_test_configure!(run_in_browser);

static mut LOG_INITIALIZED: bool = false;

fn init_log() {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}
}

#[wasm_bindgen_test]
fn replaces_target() {
	init_log();

	let document = window().unwrap().document().unwrap();
	let body = document.body().unwrap().dyn_into::<HtmlBodyElement>().unwrap();
	let target = document.create_element("div").unwrap();
	target.set_id("mount-target");
	body.append_child(&target).unwrap();

	let view: View = element("section")
		.attribute("id", "mount-target")
		.child(element("h1").text("a&b<c"))
		.child(navigation_link("/tags/r/b/t", "t"))
		.into();
	mount(&document, "mount-target", &view).unwrap();

	let mounted = document.get_element_by_id("mount-target").unwrap();
	assert_eq!(mounted.tag_name(), "SECTION");
	assert_eq!(mounted.outer_html(), view.to_string());
	assert_eq!(body.get_elements_by_tag_name("section").length(), 1);
	assert!(target.parent_node().is_none());

	mounted.remove();
}

#[wasm_bindgen_test]
fn missing_target_is_an_error() {
	init_log();

	let document = window().unwrap().document().unwrap();
	assert!(mount(&document, "no-such-element", &"text".into()).is_err());
}

#[wasm_bindgen_test]
fn invalid_names_are_errors() {
	init_log();

	let document = window().unwrap().document().unwrap();
	let view: View = element("p").attribute("not valid", "").into();
	assert!(materialize(&document, &view).is_err());
}
