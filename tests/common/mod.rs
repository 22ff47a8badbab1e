//! In-memory browser for end-to-end tests.
//!
//! A page is a list of coloured rectangles on a white background. Navigation
//! and clicks emit one network request each, so the idle waiters see traffic.
//! With [`FakeBrowser::with_click_poll`] every click also opens a long poll
//! that never finishes.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedSender};
use futures::StreamExt;
use image::{ImageOutputFormat, Rgba, RgbaImage};
use vrt_lib::{
    BoundingBox, BrowserDriver, ElementHandle, ElementRect, NetworkEvent, NetworkEventStream,
    PageDriver, Result, VrtError,
};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLUE: Rgba<u8> = Rgba([20, 60, 200, 255]);
pub const RED: Rgba<u8> = Rgba([220, 30, 30, 255]);
pub const GREEN: Rgba<u8> = Rgba([30, 160, 60, 255]);
pub const GRAY: Rgba<u8> = Rgba([200, 200, 200, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, Clone)]
pub struct Node {
    pub selector: String,
    pub parent: Option<String>,
    /// `None` renders nothing and reports no box (`display: none`).
    pub rect: Option<ElementRect>,
    pub color: Rgba<u8>,
}

impl Node {
    pub fn new(selector: &str, x: f64, y: f64, width: f64, height: f64, color: Rgba<u8>) -> Self {
        Self {
            selector: selector.to_string(),
            parent: None,
            rect: Some(ElementRect::new(x, y, width, height)),
            color,
        }
    }

    pub fn hidden(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            parent: None,
            rect: None,
            color: BLACK,
        }
    }

    pub fn inside(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    /// Matches `sel` or `parent sel`.
    fn matches(&self, selector: &str) -> bool {
        let parts: Vec<&str> = selector.split_whitespace().collect();
        match parts.as_slice() {
            [own] => self.selector == *own,
            [parent, own] => self.selector == *own && self.parent.as_deref() == Some(*parent),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub height: u32,
    pub nodes: Vec<Node>,
}

impl Scene {
    pub fn recolor(&mut self, selector: &str, color: Rgba<u8>) {
        for node in self.nodes.iter_mut().filter(|n| n.selector == selector) {
            node.color = color;
        }
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub open_now: AtomicUsize,
    pub max_open: AtomicUsize,
    pub visited: Mutex<Vec<String>>,
    pub interactions: Mutex<Vec<String>>,
    /// Every `set_viewport` call as (width, height, scale).
    pub viewports: Mutex<Vec<(u32, u32, f64)>>,
}

#[derive(Clone)]
pub struct FakeBrowser {
    scene: Arc<Mutex<Scene>>,
    stats: Arc<Stats>,
    request_duration: Duration,
    goto_delay: Duration,
    click_poll: bool,
}

impl FakeBrowser {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene: Arc::new(Mutex::new(scene)),
            stats: Arc::new(Stats::default()),
            request_duration: Duration::from_millis(30),
            goto_delay: Duration::ZERO,
            click_poll: false,
        }
    }

    pub fn with_click_poll(mut self) -> Self {
        self.click_poll = true;
        self
    }

    pub fn with_goto_delay(mut self, delay: Duration) -> Self {
        self.goto_delay = delay;
        self
    }

    pub fn update(&self, change: impl FnOnce(&mut Scene)) {
        change(&mut self.scene.lock().unwrap());
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

impl BrowserDriver for FakeBrowser {
    type Page = FakePage;

    async fn new_page(&self) -> Result<FakePage> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(now, Ordering::SeqCst);
        Ok(FakePage {
            scene: Arc::clone(&self.scene),
            stats: Arc::clone(&self.stats),
            viewport: Mutex::new((800, 600, 1.0)),
            listeners: Mutex::new(Vec::new()),
            request_duration: self.request_duration,
            goto_delay: self.goto_delay,
            click_poll: self.click_poll,
        })
    }
}

pub struct FakePage {
    scene: Arc<Mutex<Scene>>,
    stats: Arc<Stats>,
    viewport: Mutex<(u32, u32, f64)>,
    listeners: Mutex<Vec<UnboundedSender<NetworkEvent>>>,
    request_duration: Duration,
    goto_delay: Duration,
    click_poll: bool,
}

impl FakePage {
    fn emit(&self, event: NetworkEvent) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|tx| tx.unbounded_send(event).is_ok());
    }

    async fn request(&self) {
        self.emit(NetworkEvent::RequestStarted);
        tokio::time::sleep(self.request_duration).await;
        self.emit(NetworkEvent::RequestFinished);
    }

    fn matching(&self, selector: &str) -> Vec<Node> {
        self.scene
            .lock()
            .unwrap()
            .nodes
            .iter()
            .filter(|n| n.matches(selector))
            .cloned()
            .collect()
    }

    fn require(&self, selector: &str) -> Result<()> {
        if self.matching(selector).is_empty() {
            return Err(VrtError::browser(format!("No element matches selector {:?}", selector)));
        }
        self.stats
            .interactions
            .lock()
            .unwrap()
            .push(selector.to_string());
        Ok(())
    }

    fn render(&self) -> RgbaImage {
        let (width, height, scale) = *self.viewport.lock().unwrap();
        let mut canvas = RgbaImage::from_pixel(
            device_px(width, scale),
            device_px(height, scale),
            WHITE,
        );
        for node in &self.scene.lock().unwrap().nodes {
            let Some(rect) = node.rect else { continue };
            let Some(bbox) = BoundingBox::enclosing(&rect.scale(scale))
                .clip_to(canvas.width(), canvas.height())
            else {
                continue;
            };
            for y in bbox.y..bbox.bottom() {
                for x in bbox.x..bbox.right() {
                    canvas.put_pixel(x as u32, y as u32, node.color);
                }
            }
        }
        canvas
    }
}

fn device_px(css: u32, scale: f64) -> u32 {
    (f64::from(css) * scale).round() as u32
}

pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

pub struct FakeElement {
    rect: Option<ElementRect>,
    shot: Option<RgbaImage>,
}

impl ElementHandle for FakeElement {
    async fn bounding_rect(&self) -> Result<Option<ElementRect>> {
        Ok(self.rect)
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        self.shot
            .as_ref()
            .map(encode_png)
            .ok_or_else(|| VrtError::capture("Element is not visible"))
    }
}

impl PageDriver for FakePage {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> Result<()> {
        self.stats.visited.lock().unwrap().push(url.to_string());
        tokio::time::sleep(self.goto_delay).await;
        self.request().await;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.require(selector)?;
        if self.click_poll {
            self.emit(NetworkEvent::RequestStarted);
        }
        self.request().await;
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        self.require(selector)
    }

    async fn type_text(&self, selector: &str, input: &str) -> Result<()> {
        self.require(selector)?;
        self.stats
            .interactions
            .lock()
            .unwrap()
            .push(format!("type:{input}"));
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        self.require(selector)
    }

    async fn set_viewport(&self, width: u32, height: u32, device_scale_factor: f64) -> Result<()> {
        *self.viewport.lock().unwrap() = (width, height, device_scale_factor);
        self.stats
            .viewports
            .lock()
            .unwrap()
            .push((width, height, device_scale_factor));
        Ok(())
    }

    async fn content_height(&self) -> Result<u32> {
        Ok(self.scene.lock().unwrap().height)
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<FakeElement>> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<FakeElement>> {
        let scale = self.viewport.lock().unwrap().2;
        let render = self.render();
        Ok(self
            .matching(selector)
            .into_iter()
            .map(|node| {
                let shot = node.rect.and_then(|rect| {
                    let bbox = BoundingBox::enclosing(&rect.scale(scale))
                        .clip_to(render.width(), render.height())?;
                    Some(
                        image::imageops::crop_imm(
                            &render,
                            bbox.x as u32,
                            bbox.y as u32,
                            bbox.width as u32,
                            bbox.height as u32,
                        )
                        .to_image(),
                    )
                });
                FakeElement {
                    rect: node.rect,
                    shot,
                }
            })
            .collect())
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        Ok(encode_png(&self.render()))
    }

    async fn network_events(&self) -> Result<NetworkEventStream> {
        let (tx, rx) = mpsc::unbounded();
        self.listeners.lock().unwrap().push(tx);
        Ok(rx.boxed())
    }

    async fn close(self) -> Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        self.stats.open_now.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A page with a title, a ticking clock, and a card holding a price plus
/// two elements that never render.
pub fn sample_scene() -> Scene {
    Scene {
        height: 150,
        nodes: vec![
            Node::new(".title", 10.0, 10.0, 60.0, 20.0, BLUE),
            Node::new(".clock", 80.0, 40.0, 30.0, 15.0, RED),
            Node::new(".card", 10.0, 60.0, 100.0, 80.0, GRAY),
            Node::new(".price", 20.0, 70.0, 40.0, 20.0, GREEN).inside(".card"),
            Node::hidden(".badge").inside(".card"),
            Node::new(".empty", 30.0, 100.0, 0.0, 0.0, BLACK).inside(".card"),
        ],
    }
}
