mod common;

use anyhow::Result;
use image_swap::constants::{MARKER_CLASS, STYLE_ELEMENT_ID};
use image_swap::{
    Command, ContentScript, Dimensions, Document, LoadState, MemoryDocument, MemorySettingsStore,
    ObserverPhase, PageSignal, PatternEntry, PatternMode, PreparedCommand, ReplacementMode,
    ReplacementTarget, ScanSummary, Settings, SettingsStore, hash_seed, save_settings,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{by_id, document_from_html, src};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::wasm_bindgen_test;

const PAGE: &str = "https://news.example.com/today";

fn settings_with_mode(mode: ReplacementMode) -> Settings {
    Settings {
        replacement_mode: mode,
        ..Default::default()
    }
}

/// Feed every recorded mutation back into the script until the page stops
/// changing, returning how many rounds that took.
fn settle(script: &mut ContentScript<image_swap::NodeId>, document: &mut MemoryDocument) -> usize {
    let mut rounds = 0;
    loop {
        let mutations = document.take_mutations();
        if mutations.is_empty() {
            return rounds;
        }
        script.handle(document, PageSignal::Mutations(mutations));
        rounds += 1;
    }
}

#[test]
fn it_replaces_every_image_in_all_mode() {
    let mut document = document_from_html(
        r#"<body><img id="a" width="50" height="50" style="visibility: hidden"></body>"#,
    );
    let image = by_id(&document, "a");
    document.set_inline_style(image, "visibility", "hidden");

    let mut script = ContentScript::new(PAGE, Settings::default());
    let summary = script.start(&mut document);

    assert_eq!(summary.replaced, 1);
    assert_eq!(src(&document, image), "https://picsum.photos/seed/117529463/50/50");
    assert!(document.has_class(image, MARKER_CLASS));
    assert_eq!(document.style(&image, "visibility"), "");
}

#[test]
fn it_replaces_exactly_once_after_a_double_dispatched_load_error() {
    let mut document = document_from_html(
        r#"<body><img id="broken" src="/missing.png"><img id="fine" src="/ok.png"></body>"#,
    );
    let broken = by_id(&document, "broken");
    let fine = by_id(&document, "fine");
    document.set_load_state(fine, LoadState::Loaded);

    let mut script = ContentScript::new(PAGE, settings_with_mode(ReplacementMode::Failed));
    let summary = script.start(&mut document);
    assert_eq!(
        summary,
        ScanSummary {
            replaced: 0,
            pending: 1,
            skipped: 1
        }
    );
    assert_eq!(src(&document, broken), "/missing.png");

    assert!(document.fail_load(broken));
    let first = script.handle(&mut document, PageSignal::LoadError(broken));
    let second = script.handle(&mut document, PageSignal::LoadError(broken));

    assert_eq!(first.replaced, 1);
    assert_eq!(second.replaced, 0);
    assert_eq!(
        src(&document, broken),
        ReplacementTarget::new(hash_seed("|broken|||"), Dimensions::default()).url()
    );
    assert_eq!(src(&document, fine), "/ok.png");
    assert_eq!(settle(&mut script, &mut document), 1);
}

#[test]
fn it_replaces_images_that_already_failed_in_failed_mode() {
    let mut document = document_from_html(r#"<body><img id="gone" src="/404.png"></body>"#);
    let gone = by_id(&document, "gone");
    document.set_load_state(gone, LoadState::Failed);

    let mut script = ContentScript::new(PAGE, settings_with_mode(ReplacementMode::Failed));
    assert_eq!(script.start(&mut document).replaced, 1);
    assert_eq!(document.error_watch_count(gone), 0);
}

#[test]
fn it_lets_the_first_matching_pattern_decide_the_mode() {
    let settings = Settings {
        url_patterns: vec![
            PatternEntry::new("https://news.example.com/*").with_mode(PatternMode::Failed),
            PatternEntry::new("https://*.example.com/*").with_mode(PatternMode::All),
        ],
        ..Default::default()
    };
    let mut document = document_from_html(r#"<body><img id="a" src="/a.png"></body>"#);
    let image = by_id(&document, "a");
    document.set_load_state(image, LoadState::Loaded);

    let mut script = ContentScript::new(PAGE, settings);
    assert_eq!(script.mode(), ReplacementMode::Failed);
    script.start(&mut document);
    assert_eq!(src(&document, image), "/a.png");
}

#[test]
fn it_does_nothing_when_every_pattern_is_disabled() {
    let settings = Settings {
        url_patterns: vec![PatternEntry::new("https://news.example.com/*").with_enabled(false)],
        ..Default::default()
    };
    let mut document = document_from_html(r#"<body><img id="a" src="/a.png"></body>"#);
    let image = by_id(&document, "a");

    let mut script = ContentScript::new(PAGE, settings);
    script.start(&mut document);

    assert!(!script.is_url_allowed());
    assert_eq!(src(&document, image), "/a.png");
    assert_eq!(script.bridge().phase(), ObserverPhase::Detached);
}

#[test]
fn it_is_idempotent_across_passes() {
    let mut document = document_from_html(
        r#"<body><div class="feed"><img id="one" alt="first"><img id="two" alt="second"></div></body>"#,
    );
    let one = by_id(&document, "one");

    let mut script = ContentScript::new(PAGE, Settings::default());
    script.start(&mut document);
    let before = src(&document, one);
    settle(&mut script, &mut document);

    let again = script.process_page(&mut document);
    assert_eq!(again.replaced, 0);
    assert_eq!(again.skipped, 2);
    assert_eq!(src(&document, one), before);
    assert_eq!(document.error_watch_count(one), 1);
    assert!(document.take_mutations().is_empty());
}

#[test]
fn it_handles_pictures_and_whitelists() {
    let mut document = document_from_html(
        r#"<body>
            <picture id="hero">
                <source id="hero-source" srcset="/hero.webp">
                <img id="hero-image" src="/hero.jpg">
            </picture>
            <picture class="gallery">
                <source id="gallery-source" srcset="/g.webp" style="opacity: 0">
                <img id="gallery-image" src="/g.jpg" width="120" height="80">
            </picture>
            <img id="logo" class="brand logo" src="/logo.svg">
        </body>"#,
    );
    let gallery_source = by_id(&document, "gallery-source");
    document.set_inline_style(gallery_source, "opacity", "0");

    let settings = Settings {
        whitelist: vec!["#hero".into(), "#hero img".into(), "img.logo".into()],
        ..Default::default()
    };
    let mut script = ContentScript::new(PAGE, settings);
    let summary = script.start(&mut document);

    assert_eq!(summary.replaced, 2);
    assert_eq!(src(&document, by_id(&document, "hero-image")), "/hero.jpg");
    assert_eq!(
        document.attribute(&by_id(&document, "hero-source"), "srcset").as_deref(),
        Some("/hero.webp")
    );
    assert_eq!(src(&document, by_id(&document, "logo")), "/logo.svg");

    let gallery_image = src(&document, by_id(&document, "gallery-image"));
    assert!(gallery_image.ends_with("/120/80"));
    assert_eq!(
        document.attribute(&gallery_source, "srcset"),
        Some(gallery_image)
    );
    assert_eq!(document.style(&gallery_source, "opacity"), "");
}

#[test]
fn it_processes_inserted_content_without_feedback_loops() {
    let mut document = document_from_html("<body><main id=\"main\"></main></body>");
    let main = by_id(&document, "main");
    let mut script = ContentScript::new(PAGE, Settings::default());
    script.start(&mut document);

    let card = document.create_element("div");
    let image = document.create_element("img");
    document.set_attribute(&image, "src", "/late.png");
    document.append_child(card, image);
    document.append_child(main, card);

    assert_eq!(settle(&mut script, &mut document), 2);
    assert!(src(&document, image).starts_with("https://picsum.photos/seed/"));
}

#[test]
fn it_replaces_again_when_the_page_swaps_a_source_back() {
    let mut document = document_from_html(r#"<body><img id="a" src="/a.png"></body>"#);
    let image = by_id(&document, "a");
    let mut script = ContentScript::new(PAGE, Settings::default());
    script.start(&mut document);
    settle(&mut script, &mut document);
    let placeholder = src(&document, image);

    document.set_attribute(&image, "src", "/a-hires.png");
    let mutations = document.take_mutations();
    let summary = script.handle(&mut document, PageSignal::Mutations(mutations));

    assert_eq!(summary.replaced, 1);
    assert_eq!(src(&document, image), placeholder);
    assert_eq!(document.error_watch_count(image), 1);
}

#[test]
fn it_keeps_no_bookkeeping_for_images_that_are_gone() {
    for mode in [ReplacementMode::All, ReplacementMode::Failed] {
        let mut document = document_from_html(r#"<body><section id="feed"></section></body>"#);
        let feed = by_id(&document, "feed");
        let mut script = ContentScript::new(PAGE, settings_with_mode(mode));
        script.start(&mut document);

        for index in 0..500 {
            let image = document.create_element("img");
            document.set_attribute(&image, "src", &format!("/feed/{index}.jpg"));
            document.append_child(feed, image);
            let mutations = document.take_mutations();
            script.handle(&mut document, PageSignal::Mutations(mutations));
            assert_eq!(document.error_watch_count(image), 1);

            document.set_load_state(image, LoadState::Loaded);
            document.remove(image);
        }

        let divider = document.create_element("hr");
        document.append_child(feed, divider);
        settle(&mut script, &mut document);

        assert_eq!(script.state().pending_count(), 0, "{mode:?}");
    }
}

#[test]
fn it_leaves_images_whitelisted_before_their_load_error_arrives() {
    let mut document = document_from_html(
        r#"<body><div id="wrap"><img id="slow" class="avatar" src="/slow.png"></div></body>"#,
    );
    let slow = by_id(&document, "slow");
    let wrap = by_id(&document, "wrap");
    let mut script = ContentScript::new(PAGE, settings_with_mode(ReplacementMode::Failed));
    assert_eq!(script.start(&mut document).pending, 1);

    let whitelisted = Settings {
        whitelist: vec![".avatar".into()],
        ..settings_with_mode(ReplacementMode::Failed)
    };
    script.apply(&mut document, PreparedCommand::SettingsUpdated(whitelisted));

    // Moving the image routes it through the new whitelist
    document.append_child(wrap, slow);
    settle(&mut script, &mut document);
    assert!(script.state().marks().is_marked(&document, &slow));
    assert_eq!(script.state().pending_for(&slow), 1);

    assert!(document.fail_load(slow));
    let summary = script.handle(&mut document, PageSignal::LoadError(slow));
    assert_eq!(summary.replaced, 0);
    assert_eq!(src(&document, slow), "/slow.png");
    assert_eq!(script.state().pending_count(), 0);
}

#[test]
fn it_bootstraps_the_observer_when_body_is_missing() {
    let mut document = MemoryDocument::without_body();
    document.set_loading(true);
    let mut script = ContentScript::new(PAGE, Settings::default());

    assert_eq!(script.start(&mut document), ScanSummary::default());
    assert_eq!(script.bridge().phase(), ObserverPhase::AwaitingBody);

    let root = document.root();
    let body = document.create_element("body");
    document.append_child(root, body);
    let parsed = document.create_element("img");
    document.append_child(body, parsed);
    settle(&mut script, &mut document);
    assert_eq!(script.bridge().phase(), ObserverPhase::Observing);

    document.set_loading(false);
    assert_eq!(script.handle(&mut document, PageSignal::DomReady).replaced, 1);

    let late = document.create_element("img");
    document.append_child(body, late);
    settle(&mut script, &mut document);
    assert!(src(&document, late).starts_with("https://picsum.photos/seed/"));
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_applies_commands_read_from_the_store() -> Result<()> {
    let mut store = MemorySettingsStore::default();
    save_settings(&mut store, &settings_with_mode(ReplacementMode::Failed)).await?;

    let mut document = document_from_html(r#"<body><img id="a" src="/a.png"></body>"#);
    let image = by_id(&document, "a");
    document.set_load_state(image, LoadState::Loaded);

    let mut script = ContentScript::load(PAGE, &store).await?;
    script.start(&mut document);
    assert_eq!(src(&document, image), "/a.png");

    store
        .set(json!({ "replacementMode": "all", "customCss": "img { outline: 1px solid red; }" })
            .as_object()
            .cloned()
            .unwrap_or_default())
        .await?;

    let updated: Command = serde_json::from_value(json!({ "action": "settingsUpdated" }))?;
    let response = script.apply(&mut document, updated.prepare(&store).await?);
    assert!(response.success);
    assert_eq!(script.mode(), ReplacementMode::All);
    assert_eq!(src(&document, image), "/a.png");

    let reprocess: Command = serde_json::from_value(json!({ "action": "reprocessImages" }))?;
    script.apply(&mut document, reprocess.prepare(&store).await?);
    assert!(src(&document, image).starts_with("https://picsum.photos/seed/"));

    script.apply(&mut document, Command::ReloadCss.prepare(&store).await?);
    let style = document
        .element_by_id(STYLE_ELEMENT_ID)
        .expect("stylesheet is installed");
    assert_eq!(document.text(style), "img { outline: 1px solid red; }");

    let toggle: Command = serde_json::from_value(json!({ "action": "toggleEnabled", "enabled": false }))?;
    script.apply(&mut document, toggle.prepare(&store).await?);
    assert!(!script.settings().enabled);
    Ok(())
}
