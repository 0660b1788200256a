//! 界面层：叠加在 3D 场景之上的 2D 视图树。
//!
//! 坐标单位为画布点（左上角为原点，y 向下）。子元素的 `frame` 相对父元素左上角。
//!
//! 每个元素有一组**模型值**（frame、alpha、缩放、旋转）。[`Overlay::animate`] 在闭包里修改模型值，
//! 并为发生变化的属性登记缓入缓出的补间：绘制使用补间中的**呈现值**，点击命中测试始终使用模型值。

use std::fmt;

use nalgebra::{Matrix3, Point2, Vector2};
use uuid::Uuid;

use crate::{
    color::Color,
    resource::ResourcePath,
    text::{FontDescriptor, TextAlignment},
};

/// 低于该 alpha 的元素不参与命中测试。
const HIT_TEST_MIN_ALPHA: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(Uuid);

impl ElementId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// 画布点坐标下的矩形。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }

    pub fn size(&self) -> Vector2<f32> {
        Vector2::new(self.width, self.height)
    }

    /// 中心点（与 `frame` 同一坐标系）。
    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    fn lerp(&self, to: &Rect, t: f32) -> Rect {
        Rect {
            x: lerp(self.x, to.x, t),
            y: lerp(self.y, to.y, t),
            width: lerp(self.width, to.width, t),
            height: lerp(self.height, to.height, t),
        }
    }
}

/// 文本标签。
#[derive(Debug, Clone, PartialEq)]
pub struct LabelContent {
    pub text: String,
    pub font: FontDescriptor,
    pub size: f32,
    pub color: Color,
    /// 最大行数，0 表示不限。
    pub lines: usize,
    pub alignment: TextAlignment,
}

impl LabelContent {
    /// 默认：系统字体 17 点、黑色、单行、左对齐。
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: FontDescriptor::system(),
            size: 17.0,
            color: Color::BLACK,
            lines: 1,
            alignment: TextAlignment::Left,
        }
    }

    pub fn font(mut self, font: FontDescriptor, size: f32) -> Self {
        self.font = font;
        self.size = size;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn lines(mut self, lines: usize) -> Self {
        self.lines = lines;
        self
    }

    pub fn alignment(mut self, alignment: TextAlignment) -> Self {
        self.alignment = alignment;
        self
    }
}

/// 按钮：可带标题、背景图与边框。新建的按钮默认不响应点击，需要 [`Overlay::set_enabled`] 激活。
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonContent {
    pub title: Option<LabelContent>,
    pub background: Option<ResourcePath>,
    pub border_width: f32,
    pub border_color: Color,
    pub enabled: bool,
}

impl ButtonContent {
    /// 居中的白色标题。
    pub fn titled(title: impl Into<String>, font: FontDescriptor, size: f32) -> Self {
        Self {
            title: Some(
                LabelContent::new(title)
                    .font(font, size)
                    .color(Color::WHITE)
                    .alignment(TextAlignment::Center),
            ),
            background: None,
            border_width: 0.0,
            border_color: Color::WHITE,
            enabled: false,
        }
    }

    /// 以图片为背景、无标题。
    pub fn image(path: impl Into<ResourcePath>) -> Self {
        Self {
            title: None,
            background: Some(path.into()),
            border_width: 0.0,
            border_color: Color::WHITE,
            enabled: false,
        }
    }

    pub fn border(mut self, width: f32, color: Color) -> Self {
        self.border_width = width.max(0.0);
        self.border_color = color;
        self
    }
}

/// 直线段，端点位于父元素坐标系（根元素即画布）。
#[derive(Debug, Clone, PartialEq)]
pub struct LineContent {
    pub from: Point2<f32>,
    pub to: Point2<f32>,
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// 纯色（可圆角）矩形。
    Plain { color: Color, corner_radius: f32 },
    /// 图片视图，拉伸填满 frame。
    Image(ResourcePath),
    Label(LabelContent),
    Button(ButtonContent),
    Line(LineContent),
}

/// 可动画的模型属性。
#[derive(Debug, Clone, Copy, PartialEq)]
struct Props {
    frame: Rect,
    alpha: f32,
    scale: f32,
    rotation: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct PropMask {
    frame: bool,
    alpha: bool,
    scale: bool,
    rotation: bool,
}

impl PropMask {
    fn between(a: &Props, b: &Props) -> Self {
        Self {
            frame: a.frame != b.frame,
            alpha: a.alpha != b.alpha,
            scale: a.scale != b.scale,
            rotation: a.rotation != b.rotation,
        }
    }

    fn any(&self) -> bool {
        self.frame || self.alpha || self.scale || self.rotation
    }

    fn remove(&mut self, other: &PropMask) {
        self.frame &= !other.frame;
        self.alpha &= !other.alpha;
        self.scale &= !other.scale;
        self.rotation &= !other.rotation;
    }
}

#[derive(Debug, Clone)]
struct Tween {
    from: Props,
    to: Props,
    mask: PropMask,
    elapsed: f32,
    duration: f32,
}

impl Tween {
    fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ease_in_out((self.elapsed / self.duration).clamp(0.0, 1.0))
    }

    fn apply(&self, props: &mut Props) {
        let t = self.progress();
        if self.mask.frame {
            props.frame = self.from.frame.lerp(&self.to.frame, t);
        }
        if self.mask.alpha {
            props.alpha = lerp(self.from.alpha, self.to.alpha, t);
        }
        if self.mask.scale {
            props.scale = lerp(self.from.scale, self.to.scale, t);
        }
        if self.mask.rotation {
            props.rotation = lerp(self.from.rotation, self.to.rotation, t);
        }
    }
}

/// 界面元素。
#[derive(Debug, Clone)]
pub struct Element {
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    content: Content,
    model: Props,
    hidden: bool,
    tweens: Vec<Tween>,
}

impl Element {
    fn with_content(frame: Rect, content: Content) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            content,
            model: Props {
                frame,
                alpha: 1.0,
                scale: 1.0,
                rotation: 0.0,
            },
            hidden: false,
            tweens: Vec::new(),
        }
    }

    pub fn plain(frame: Rect, color: Color) -> Self {
        Self::with_content(
            frame,
            Content::Plain {
                color,
                corner_radius: 0.0,
            },
        )
    }

    pub fn image(frame: Rect, path: impl Into<ResourcePath>) -> Self {
        Self::with_content(frame, Content::Image(path.into()))
    }

    pub fn label(frame: Rect, label: LabelContent) -> Self {
        Self::with_content(frame, Content::Label(label))
    }

    pub fn button(frame: Rect, button: ButtonContent) -> Self {
        Self::with_content(frame, Content::Button(button))
    }

    pub fn line(from: Point2<f32>, to: Point2<f32>, width: f32, color: Color) -> Self {
        Self::with_content(
            Rect::default(),
            Content::Line(LineContent {
                from,
                to,
                width,
                color,
            }),
        )
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.model.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn with_corner_radius(mut self, radius: f32) -> Self {
        if let Content::Plain { corner_radius, .. } = &mut self.content {
            *corner_radius = radius.max(0.0);
        }
        self
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn frame(&self) -> Rect {
        self.model.frame
    }

    pub fn alpha(&self) -> f32 {
        self.model.alpha
    }

    pub fn scale(&self) -> f32 {
        self.model.scale
    }

    pub fn rotation(&self) -> f32 {
        self.model.rotation
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// 按钮是否响应点击。非按钮元素总为 `false`。
    pub fn is_enabled(&self) -> bool {
        matches!(&self.content, Content::Button(button) if button.enabled)
    }

    /// 标签文本或按钮标题。
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Label(label) => Some(label.text.as_str()),
            Content::Button(ButtonContent {
                title: Some(title), ..
            }) => Some(title.text.as_str()),
            _ => None,
        }
    }

    /// 当前帧的呈现值（补间中）。
    pub fn presented_alpha(&self) -> f32 {
        self.presentation().alpha
    }

    pub fn presented_scale(&self) -> f32 {
        self.presentation().scale
    }

    pub fn presented_rotation(&self) -> f32 {
        self.presentation().rotation
    }

    pub fn presented_frame(&self) -> Rect {
        self.presentation().frame
    }

    pub fn is_animating(&self) -> bool {
        !self.tweens.is_empty()
    }

    fn presentation(&self) -> Props {
        let mut props = self.model;
        for tween in &self.tweens {
            tween.apply(&mut props);
        }
        props
    }

    fn advance(&mut self, delta: f32) {
        for tween in &mut self.tweens {
            tween.elapsed += delta;
        }
        self.tweens.retain(|t| t.elapsed < t.duration);
    }

    fn push_tween(&mut self, tween: Tween) {
        for existing in &mut self.tweens {
            existing.mask.remove(&tween.mask);
        }
        self.tweens.retain(|t| t.mask.any());
        self.tweens.push(tween);
    }
}

/// 元素在父坐标系中的仿射变换：平移到 frame 原点，再绕自身中心旋转与缩放。
fn local_matrix(props: &Props) -> Matrix3<f32> {
    let half = props.frame.size() * 0.5;
    Matrix3::new_translation(&(props.frame.origin().coords + half))
        * Matrix3::new_rotation(props.rotation)
        * Matrix3::new_scaling(props.scale)
        * Matrix3::new_translation(&(-half))
}

/// 需要栅格化的文本。
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub label: LabelContent,
    /// 文本区域尺寸（点）。
    pub width: f32,
    pub height: f32,
}

impl TextRequest {
    /// 用于纹理缓存的键。
    pub fn cache_key(&self, scale: f32) -> String {
        format!(
            "{}|{}|{}|{:.2}|{:?}|{}|{:?}|{:.1}x{:.1}@{:.2}",
            self.label.text,
            self.label.font.family,
            self.label.font.weight,
            self.label.size,
            self.label.color.to_rgba8(),
            self.label.lines,
            self.label.alignment,
            self.width,
            self.height,
            scale,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawTexture {
    Image(ResourcePath),
    Text(TextRequest),
}

/// 绘制列表中的一个四边形。
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub element: ElementId,
    /// 画布坐标下的四个角：左上、右上、右下、左下。
    pub corners: [Point2<f32>; 4],
    /// 元素自身坐标系下的尺寸（点），用于圆角与边框计算。
    pub size: Vector2<f32>,
    pub color: Color,
    /// 沿父链叠乘后的不透明度。
    pub opacity: f32,
    pub corner_radius: f32,
    /// 大于 0 时只绘制该宽度的边框。
    pub border_width: f32,
    pub texture: Option<DrawTexture>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum OverlayError {
    MissingElement(ElementId),
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayError::MissingElement(id) => write!(f, "界面元素 {} 不存在", id),
        }
    }
}

impl std::error::Error for OverlayError {}

/// 界面层视图树。
#[derive(Debug, Clone)]
pub struct Overlay {
    canvas: Vector2<f32>,
    roots: Vec<ElementId>,
    elements: std::collections::HashMap<ElementId, Element>,
}

impl Overlay {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            canvas: Vector2::new(width, height),
            roots: Vec::new(),
            elements: std::collections::HashMap::new(),
        }
    }

    pub fn canvas_size(&self) -> Vector2<f32> {
        self.canvas
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// 添加顶层元素（绘制在已有元素之上）。
    pub fn add(&mut self, element: Element) -> ElementId {
        let id = ElementId::new();
        self.roots.push(id);
        self.elements.insert(
            id,
            Element {
                parent: None,
                children: Vec::new(),
                ..element
            },
        );
        id
    }

    /// 添加子元素，`frame` 相对父元素左上角。
    pub fn add_child(&mut self, parent: ElementId, element: Element) -> Result<ElementId, OverlayError> {
        let parent_element = self
            .elements
            .get_mut(&parent)
            .ok_or(OverlayError::MissingElement(parent))?;
        let id = ElementId::new();
        parent_element.children.push(id);
        self.elements.insert(
            id,
            Element {
                parent: Some(parent),
                children: Vec::new(),
                ..element
            },
        );
        Ok(id)
    }

    /// 移除元素及其全部子元素。
    pub fn remove(&mut self, id: ElementId) -> Result<(), OverlayError> {
        let element = self
            .elements
            .get(&id)
            .ok_or(OverlayError::MissingElement(id))?;
        match element.parent {
            Some(parent) => {
                if let Some(parent_element) = self.elements.get_mut(&parent) {
                    parent_element.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.elements.remove(&current) {
                stack.extend(removed.children);
            }
        }
        Ok(())
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    // 以下修改模型值的便捷方法在元素不存在时不做任何事。

    pub fn set_alpha(&mut self, id: ElementId, alpha: f32) {
        if let Some(e) = self.elements.get_mut(&id) {
            e.model.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    pub fn set_scale(&mut self, id: ElementId, scale: f32) {
        if let Some(e) = self.elements.get_mut(&id) {
            e.model.scale = scale;
        }
    }

    pub fn set_rotation(&mut self, id: ElementId, radians: f32) {
        if let Some(e) = self.elements.get_mut(&id) {
            e.model.rotation = radians;
        }
    }

    pub fn set_frame(&mut self, id: ElementId, frame: Rect) {
        if let Some(e) = self.elements.get_mut(&id) {
            e.model.frame = frame;
        }
    }

    pub fn set_hidden(&mut self, id: ElementId, hidden: bool) {
        if let Some(e) = self.elements.get_mut(&id) {
            e.hidden = hidden;
        }
    }

    /// 修改标签文本或按钮标题。
    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) {
        let Some(e) = self.elements.get_mut(&id) else {
            return;
        };
        match &mut e.content {
            Content::Label(label) => label.text = text.into(),
            Content::Button(ButtonContent {
                title: Some(title), ..
            }) => title.text = text.into(),
            _ => {}
        }
    }

    /// 激活或停用按钮。
    pub fn set_enabled(&mut self, id: ElementId, enabled: bool) {
        if let Some(Element {
            content: Content::Button(button),
            ..
        }) = self.elements.get_mut(&id)
        {
            button.enabled = enabled;
        }
    }

    /// 修改线段端点与宽度。
    pub fn set_line(&mut self, id: ElementId, from: Point2<f32>, to: Point2<f32>, width: f32) {
        if let Some(Element {
            content: Content::Line(line),
            ..
        }) = self.elements.get_mut(&id)
        {
            line.from = from;
            line.to = to;
            line.width = width.max(0.0);
        }
    }

    /// 在闭包中修改模型值，并为变化的属性登记 `duration` 秒的缓入缓出补间。
    ///
    /// 补间从修改前的呈现值出发，因此打断进行中的动画不会跳变。
    ///
    /// ```
    /// use celestial_core::{color::Color, game::overlay::{Element, Overlay, Rect}};
    ///
    /// let mut overlay = Overlay::new(1000.0, 800.0);
    /// let id = overlay.add(Element::plain(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE).with_alpha(0.0));
    /// overlay.animate(1.5, |o| o.set_alpha(id, 1.0));
    ///
    /// assert_eq!(overlay.element(id).unwrap().alpha(), 1.0);
    /// assert_eq!(overlay.element(id).unwrap().presented_alpha(), 0.0);
    /// ```
    pub fn animate(&mut self, duration: f32, changes: impl FnOnce(&mut Self)) {
        let before: Vec<(ElementId, Props, Props)> = self
            .elements
            .iter()
            .map(|(id, e)| (*id, e.model, e.presentation()))
            .collect();

        changes(self);

        if duration <= 0.0 {
            return;
        }
        for (id, model_before, presented_before) in before {
            let Some(element) = self.elements.get_mut(&id) else {
                continue;
            };
            let mask = PropMask::between(&model_before, &element.model);
            if !mask.any() {
                continue;
            }
            element.push_tween(Tween {
                from: presented_before,
                to: element.model,
                mask,
                elapsed: 0.0,
                duration,
            });
        }
    }

    /// 推进所有补间。
    pub fn advance(&mut self, delta: f32) {
        if delta <= 0.0 {
            return;
        }
        for element in self.elements.values_mut() {
            if element.is_animating() {
                element.advance(delta);
            }
        }
    }

    pub fn is_animating(&self) -> bool {
        self.elements.values().any(Element::is_animating)
    }

    /// 按绘制顺序（先序深度优先）返回元素及其父链叠乘后的变换与 alpha。
    fn walk(&self, presented: bool) -> Vec<(ElementId, Matrix3<f32>, f32)> {
        let mut out = Vec::with_capacity(self.elements.len());
        let mut stack: Vec<(ElementId, Matrix3<f32>, f32)> = self
            .roots
            .iter()
            .rev()
            .map(|id| (*id, Matrix3::identity(), 1.0))
            .collect();

        while let Some((id, parent_matrix, parent_alpha)) = stack.pop() {
            let Some(element) = self.elements.get(&id) else {
                continue;
            };
            if element.hidden {
                continue;
            }
            let props = if presented {
                element.presentation()
            } else {
                element.model
            };
            let matrix = parent_matrix * local_matrix(&props);
            let alpha = parent_alpha * props.alpha;
            out.push((id, matrix, alpha));
            for child in element.children.iter().rev() {
                stack.push((*child, matrix, alpha));
            }
        }
        out
    }

    /// 返回画布坐标 `point` 处最上层的可点击按钮。
    pub fn hit_test(&self, point: Point2<f32>) -> Option<ElementId> {
        self.walk(false)
            .into_iter()
            .rev()
            .find(|(id, matrix, alpha)| {
                let Some(element) = self.elements.get(id) else {
                    return false;
                };
                if !element.is_enabled() || *alpha < HIT_TEST_MIN_ALPHA {
                    return false;
                }
                let Some(inverse) = matrix.try_inverse() else {
                    return false;
                };
                let local = inverse.transform_point(&point);
                let frame = element.model.frame;
                (0.0..=frame.width).contains(&local.x) && (0.0..=frame.height).contains(&local.y)
            })
            .map(|(id, _, _)| id)
    }

    /// 当前帧的绘制列表（自底向上）。
    pub fn draw_list(&self) -> Vec<DrawItem> {
        let mut items = Vec::new();
        for (id, matrix, opacity) in self.walk(true) {
            if opacity <= 0.0 {
                continue;
            }
            let Some(element) = self.elements.get(&id) else {
                continue;
            };
            let frame = element.presentation().frame;
            let size = frame.size();
            let quad = |color: Color, corner_radius: f32, border_width: f32, texture| DrawItem {
                element: id,
                corners: rect_corners(&matrix, size),
                size,
                color,
                opacity,
                corner_radius,
                border_width,
                texture,
            };

            match &element.content {
                Content::Plain {
                    color,
                    corner_radius,
                } => items.push(quad(*color, *corner_radius, 0.0, None)),
                Content::Image(path) => {
                    items.push(quad(Color::WHITE, 0.0, 0.0, Some(DrawTexture::Image(path.clone()))))
                }
                Content::Label(label) => {
                    if !label.text.is_empty() {
                        items.push(quad(
                            Color::WHITE,
                            0.0,
                            0.0,
                            Some(DrawTexture::Text(TextRequest {
                                label: label.clone(),
                                width: size.x,
                                height: size.y,
                            })),
                        ));
                    }
                }
                Content::Button(button) => {
                    if let Some(background) = &button.background {
                        items.push(quad(
                            Color::WHITE,
                            0.0,
                            0.0,
                            Some(DrawTexture::Image(background.clone())),
                        ));
                    }
                    if button.border_width > 0.0 {
                        items.push(quad(button.border_color, 0.0, button.border_width, None));
                    }
                    if let Some(title) = button.title.as_ref().filter(|t| !t.text.is_empty()) {
                        items.push(quad(
                            Color::WHITE,
                            0.0,
                            0.0,
                            Some(DrawTexture::Text(TextRequest {
                                label: title.clone(),
                                width: size.x,
                                height: size.y,
                            })),
                        ));
                    }
                }
                Content::Line(line) => {
                    if let Some(item) = line_item(id, &matrix, line, opacity) {
                        items.push(item);
                    }
                }
            }
        }
        items
    }
}

fn rect_corners(matrix: &Matrix3<f32>, size: Vector2<f32>) -> [Point2<f32>; 4] {
    [
        matrix.transform_point(&Point2::new(0.0, 0.0)),
        matrix.transform_point(&Point2::new(size.x, 0.0)),
        matrix.transform_point(&Point2::new(size.x, size.y)),
        matrix.transform_point(&Point2::new(0.0, size.y)),
    ]
}

/// 线段元素的 frame 为零矩形，`matrix` 即父链变换。
fn line_item(
    id: ElementId,
    matrix: &Matrix3<f32>,
    line: &LineContent,
    opacity: f32,
) -> Option<DrawItem> {
    let along = line.to - line.from;
    let length = along.norm();
    if length <= f32::EPSILON || line.width <= 0.0 {
        return None;
    }
    let normal = Vector2::new(-along.y, along.x) / length * (line.width * 0.5);
    let to_canvas = |p: Point2<f32>| matrix.transform_point(&p);
    Some(DrawItem {
        element: id,
        corners: [
            to_canvas(line.from - normal),
            to_canvas(line.to - normal),
            to_canvas(line.to + normal),
            to_canvas(line.from + normal),
        ],
        size: Vector2::new(length, line.width),
        color: line.color,
        opacity,
        corner_radius: 0.0,
        border_width: 0.0,
        texture: None,
    })
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// 三次缓入缓出。
fn ease_in_out(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn assert_point(actual: Point2<f32>, expected: Point2<f32>) {
        assert!(
            (actual - expected).norm() < 1e-3,
            "期望 {expected:?}，实际 {actual:?}"
        );
    }

    fn enabled_button(overlay: &mut Overlay, frame: Rect) -> ElementId {
        let id = overlay.add(Element::button(frame, ButtonContent::image("Icons/next-button.png")));
        overlay.set_enabled(id, true);
        id
    }

    #[test]
    fn animate_tweens_from_presentation_to_model() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let id = overlay.add(
            Element::label(Rect::new(230.0, 300.0, 350.0, 55.0), LabelContent::new("quote"))
                .with_alpha(0.0),
        );

        overlay.animate(1.5, |o| o.set_alpha(id, 1.0));
        overlay.advance(0.75);
        let element = overlay.element(id).expect("元素应存在");
        assert_eq!(element.alpha(), 1.0);
        assert!((element.presented_alpha() - 0.5).abs() < 1e-5, "缓入缓出的中点应为一半");

        overlay.advance(0.75);
        assert_eq!(overlay.element(id).unwrap().presented_alpha(), 1.0);
        assert!(!overlay.is_animating());
    }

    #[test]
    fn interrupted_animation_starts_from_presented_value() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let id = overlay.add(Element::plain(Rect::new(0.0, 0.0, 50.0, 50.0), Color::WHITE));

        overlay.animate(2.0, |o| o.set_scale(id, 5.0));
        overlay.advance(1.0);
        let midway = overlay.element(id).unwrap().presented_scale();
        assert!((midway - 3.0).abs() < 1e-4);

        overlay.animate(2.0, |o| o.set_scale(id, 0.00001));
        assert!((overlay.element(id).unwrap().presented_scale() - midway).abs() < 1e-4);
        overlay.advance(2.0);
        assert!(overlay.element(id).unwrap().presented_scale() < 1e-3);
    }

    #[test]
    fn untouched_properties_are_not_tweened() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let a = overlay.add(Element::plain(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE));
        let b = overlay.add(Element::plain(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE));

        overlay.animate(1.0, |o| o.set_rotation(a, PI));
        assert!(overlay.element(a).unwrap().is_animating());
        assert!(!overlay.element(b).unwrap().is_animating());
    }

    #[test]
    fn hit_test_uses_model_alpha_and_enabled_state() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let frame = Rect::new(70.0, 175.0, 640.0, 400.0);
        let button = overlay.add(
            Element::button(frame, ButtonContent::image("Icons/next-button.png")).with_alpha(0.0),
        );
        let inside = Point2::new(100.0, 200.0);

        assert_eq!(overlay.hit_test(inside), None, "未激活且透明的按钮不响应");
        overlay.set_enabled(button, true);
        assert_eq!(overlay.hit_test(inside), None, "透明按钮不响应");

        // 淡入刚开始时模型值已为 1，按钮即可点击
        overlay.animate(1.5, |o| o.set_alpha(button, 1.0));
        assert_eq!(overlay.hit_test(inside), Some(button));
        assert_eq!(overlay.hit_test(Point2::new(10.0, 10.0)), None);

        overlay.animate(1.5, |o| o.set_alpha(button, 0.0));
        assert_eq!(overlay.hit_test(inside), None, "淡出开始后立即不再响应");
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let below = enabled_button(&mut overlay, Rect::new(0.0, 0.0, 100.0, 100.0));
        let above = enabled_button(&mut overlay, Rect::new(50.0, 50.0, 100.0, 100.0));

        assert_eq!(overlay.hit_test(Point2::new(75.0, 75.0)), Some(above));
        assert_eq!(overlay.hit_test(Point2::new(25.0, 25.0)), Some(below));
    }

    #[test]
    fn hit_test_ignores_hidden_and_transparent_parents() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let window = overlay.add(Element::image(Rect::new(70.0, 175.0, 640.0, 400.0), "Icons/popup-window.png").with_alpha(0.0));
        let child = overlay
            .add_child(window, Element::button(Rect::new(0.0, 0.0, 50.0, 50.0), ButtonContent::image("x.png")))
            .expect("父元素存在");
        overlay.set_enabled(child, true);

        assert_eq!(overlay.hit_test(Point2::new(80.0, 180.0)), None);
        overlay.set_alpha(window, 1.0);
        assert_eq!(overlay.hit_test(Point2::new(80.0, 180.0)), Some(child));
        overlay.set_hidden(window, true);
        assert_eq!(overlay.hit_test(Point2::new(80.0, 180.0)), None);
    }

    #[test]
    fn scale_and_rotation_pivot_around_center() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let id = overlay.add(Element::plain(Rect::new(375.0, 375.0, 50.0, 50.0), Color::WHITE));
        overlay.set_scale(id, 2.0);

        let items = overlay.draw_list();
        assert_eq!(items.len(), 1);
        assert_point(items[0].corners[0], Point2::new(350.0, 350.0));
        assert_point(items[0].corners[2], Point2::new(450.0, 450.0));

        overlay.set_scale(id, 1.0);
        overlay.set_rotation(id, PI);
        let items = overlay.draw_list();
        assert_point(items[0].corners[0], Point2::new(425.0, 425.0));
    }

    #[test]
    fn children_inherit_transform_and_alpha() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let parent = overlay.add(Element::image(Rect::new(70.0, 175.0, 640.0, 400.0), "Icons/popup-window.png").with_alpha(0.5));
        let label = overlay
            .add_child(
                parent,
                Element::label(Rect::new(20.0, 20.0, 610.0, 350.0), LabelContent::new("story")),
            )
            .expect("父元素存在");

        let items = overlay.draw_list();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].element, label);
        assert_point(items[1].corners[0], Point2::new(90.0, 195.0));
        assert!((items[1].opacity - 0.5).abs() < 1e-6);
        assert!(matches!(items[1].texture, Some(DrawTexture::Text(_))));
    }

    #[test]
    fn draw_list_skips_invisible_and_empty() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        overlay.add(Element::plain(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE).with_alpha(0.0));
        overlay.add(Element::label(Rect::new(0.0, 0.0, 10.0, 10.0), LabelContent::new("")));
        assert!(overlay.draw_list().is_empty());
    }

    #[test]
    fn button_draws_border_and_title() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        overlay.add(Element::button(
            Rect::new(307.5, 630.0, 180.0, 90.0),
            ButtonContent::titled("Explore", FontDescriptor::thin(), 45.0).border(2.5, Color::WHITE),
        ));
        let items = overlay.draw_list();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].border_width, 2.5);
        assert!(matches!(&items[1].texture, Some(DrawTexture::Text(t)) if t.label.text == "Explore"));
    }

    #[test]
    fn line_quad_spans_endpoints() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let line = overlay.add(Element::line(
            Point2::new(405.0, 400.0),
            Point2::new(405.0, 300.0),
            2.0,
            Color::WHITE,
        ));
        let items = overlay.draw_list();
        assert_eq!(items[0].size, Vector2::new(100.0, 2.0));
        let xs: Vec<f32> = items[0].corners.iter().map(|c| c.x).collect();
        assert!(xs.iter().all(|x| (x - 404.0).abs() < 1e-4 || (x - 406.0).abs() < 1e-4));

        overlay.set_line(line, Point2::new(405.0, 400.0), Point2::new(550.0, 290.0), 0.0);
        assert!(overlay.draw_list().is_empty(), "宽度为 0 的线段不绘制");
    }

    #[test]
    fn remove_drops_children() {
        let mut overlay = Overlay::new(1000.0, 800.0);
        let parent = overlay.add(Element::plain(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE));
        let child = overlay
            .add_child(parent, Element::plain(Rect::new(0.0, 0.0, 5.0, 5.0), Color::WHITE))
            .expect("父元素存在");
        overlay.remove(parent).expect("应能移除");
        assert!(overlay.element(child).is_none());
        assert!(overlay.is_empty());
        assert_eq!(overlay.remove(parent), Err(OverlayError::MissingElement(parent)));
    }
}
