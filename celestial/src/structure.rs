//! 行星结构画面：由内到外逐层展示球壳，最后露出带纹理的行星本体。

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use celestial_core::{
    color::Color,
    event::Event,
    game::{
        component::{material::Material, node::Node, node::NodeId, shape::Shape},
        overlay::{Element, ElementId, LabelContent, Rect},
        scene::Scene,
        system::logic::{AppContext, Transition, View, ViewController},
        timeline::Timeline,
    },
    text::{FontDescriptor, TextAlignment},
};

use crate::{
    stage,
    universe::{self, CelestialBody},
};

/// 第 `i` 层出现的时刻（第 0 层在加载时立即出现）。
const INTERVALS: [f32; 4] = [1.5, 3.0, 4.5, 6.0];
const LABEL_X: [f32; 4] = [400.0, 400.0, 400.0, 400.0];
const LABEL_Y: [f32; 4] = [140.0, 120.0, 100.0, 80.0];
const RADII: [f32; 4] = [3.0, 5.0, 6.0, 7.0];

const FIRST_LABEL_ORIGIN: (f32, f32) = (200.0, 200.0);
const LABEL_SIZE: f32 = 300.0;
const LAYER_NAME_SIZE: f32 = 20.0;
const POINTER_WIDTH: f32 = 2.0;
const INNERMOST_RADIUS: f32 = 1.0;

const SURFACE_AT: f32 = 8.0;
const SURFACE_RADIUS: f32 = 7.5;
const SURFACE_ROTATION: f32 = 0.75;
const TITLE_FRAME: Rect = Rect::new(255.0, -75.0, LABEL_SIZE, LABEL_SIZE);
const TITLE_SIZE: f32 = 50.0;
const BACK_BORDER: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reveal {
    Layer(usize),
    Surface,
}

#[derive(Debug, Clone, Copy)]
struct StructureViews {
    layer_name: ElementId,
    pointer: ElementId,
    back: ElementId,
}

/// 第 `index` 层名称标签的位置。
fn label_frame(index: usize) -> Option<Rect> {
    Some(Rect::new(
        *LABEL_X.get(index)?,
        *LABEL_Y.get(index)?,
        LABEL_SIZE,
        LABEL_SIZE,
    ))
}

fn centered_label(text: &str, font_size: f32) -> LabelContent {
    LabelContent::new(text)
        .font(FontDescriptor::thin(), font_size)
        .color(Color::WHITE)
        .alignment(TextAlignment::Center)
}

fn add_shell(scene: &mut Scene, radius: f32, material: Material) -> Result<NodeId> {
    let root = scene.root();
    Ok(scene.add_node(root, Node::geometry(Shape::sphere(radius), material))?)
}

/// 某个天体的结构画面。
pub struct StructureController {
    body: CelestialBody,
    timeline: Timeline<Reveal>,
    views: Option<StructureViews>,
}

impl StructureController {
    pub fn new(body: CelestialBody) -> Self {
        Self {
            body,
            timeline: Timeline::new(),
            views: None,
        }
    }

    fn reveal(&self, reveal: Reveal, view: &mut View, views: StructureViews) -> Result<()> {
        match reveal {
            Reveal::Layer(index) => {
                let (Some(layer), Some(frame), Some(radius)) = (
                    self.body.layers().get(index),
                    label_frame(index),
                    RADII.get(index).copied(),
                ) else {
                    return Ok(());
                };
                debug!(target: "celestial", planet = self.body.name(), layer = %layer.name, "reveal layer");

                view.overlay.set_text(views.layer_name, layer.name.as_str());
                view.overlay.set_frame(views.layer_name, frame);
                view.overlay.set_line(
                    views.pointer,
                    stage::pointer_origin(),
                    stage::pointer_target(frame),
                    POINTER_WIDTH,
                );
                add_shell(&mut view.scene, radius, Material::color(layer.color))?;
            }
            Reveal::Surface => {
                debug!(target: "celestial", planet = self.body.name(), "reveal surface");

                let surface = add_shell(
                    &mut view.scene,
                    SURFACE_RADIUS,
                    Material::texture(self.body.texture_path()),
                )?;
                view.scene.run_action(surface, universe::spin(SURFACE_ROTATION))?;

                view.overlay.set_text(views.layer_name, "");
                view.overlay.set_hidden(views.pointer, true);
                view.overlay.add(Element::label(
                    TITLE_FRAME,
                    centered_label(&self.body.display_name(), TITLE_SIZE),
                ));

                view.overlay.set_alpha(views.back, 1.0);
                view.overlay.set_enabled(views.back, true);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ViewController for StructureController {
    fn name(&self) -> &str {
        "structure"
    }

    async fn load(&mut self, view: &mut View, _context: &AppContext) -> Result<()> {
        let scene = &mut view.scene;
        stage::place_camera(scene)?;
        stage::add_light(scene)?;
        stage::add_ambient_light(scene)?;
        view.background = Color::BLACK;
        view.set_allows_camera_control(true);

        let back = view.overlay.add(stage::bottom_button("Back", BACK_BORDER));

        let first_name = self
            .body
            .layers()
            .first()
            .map(|layer| layer.name.as_str())
            .unwrap_or_default();
        let (x, y) = FIRST_LABEL_ORIGIN;
        let first_frame = Rect::new(x, y, LABEL_SIZE, LABEL_SIZE);
        let layer_name = view.overlay.add(Element::label(
            first_frame,
            centered_label(first_name, LAYER_NAME_SIZE),
        ));
        let pointer = view.overlay.add(Element::line(
            stage::pointer_origin(),
            stage::pointer_target(first_frame),
            POINTER_WIDTH,
            Color::WHITE,
        ));

        if let Some(core) = self.body.layers().first() {
            add_shell(&mut view.scene, INNERMOST_RADIUS, Material::color(core.color))?;
        }
        for index in 1..self.body.layers().len().min(INTERVALS.len()) {
            self.timeline.schedule(INTERVALS[index], Reveal::Layer(index));
        }
        self.timeline.schedule(SURFACE_AT, Reveal::Surface);

        self.views = Some(StructureViews {
            layer_name,
            pointer,
            back,
        });
        Ok(())
    }

    fn update(
        &mut self,
        view: &mut View,
        delta: f32,
        _context: &AppContext,
    ) -> Result<Option<Transition>> {
        let Some(views) = self.views else {
            return Ok(None);
        };
        for reveal in self.timeline.advance(delta) {
            self.reveal(reveal, view, views)?;
        }
        Ok(None)
    }

    fn on_event(
        &mut self,
        _view: &mut View,
        event: &Event,
        _context: &AppContext,
    ) -> Result<Option<Transition>> {
        match (self.views, event) {
            (Some(views), Event::ButtonPressed(button)) if *button == views.back => {
                Ok(Some(Transition::Dismiss))
            }
            _ => Ok(None),
        }
    }
}
