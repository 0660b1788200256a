//! 开场画面：徽标动画、引言，然后是逐句推进的故事弹窗。

use std::f32::consts::PI;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use celestial_core::{
    audio::Sound,
    color::Color,
    event::Event,
    game::{
        overlay::{ButtonContent, Element, ElementId, Overlay, Rect},
        system::logic::{AppContext, Transition, View, ViewController},
        timeline::Timeline,
    },
};

use crate::{
    main_view::MainController,
    stage::{self, FADE_DURATION, POPUP_FRAME, POPUP_WINDOW},
};

pub const CONFIRMATION_SOUND: &str = "Music/confirmation.mp3";

const STORY: [&str; 5] = [
    "The solar system consists of all the celestial bodies that lies within the gravitational pull of our sun.",
    "Every celestial body that moves around it in an elliptical orbit is considered a planet.",
    "You might be familiarized with many aspects of these planets, such as mass, size and mean temperature.",
    "However, in a structural scope, these planets are layered by many spherical shells. It's your mission to find out how they differ internally.",
    "Try to find a planet and click on it. Some actions you may perform include pinching in, pinching out, rotating and moving.",
];
const STORY_LINES: usize = 3;

const LOGO: &str = "Icons/intro-logo.png";
const LOGO_FRAME: Rect = Rect::new(375.0, 375.0, 50.0, 50.0);
const BADGE_FRAME: Rect = Rect::new(388.0, 390.0, 25.0, 25.0);
const BADGE_CORNER_RADIUS: f32 = 7.0;
const BADGE_COLOR: Color = Color::rgb(0.52, 0.93, 0.93);
const NEXT_BUTTON: &str = "Icons/next-button.png";

const QUOTE_SIZE: f32 = 25.0;
const QUOTES: [(&str, Rect); 3] = [
    ("❝ The only way to do great work", Rect::new(230.0, 300.0, 350.0, 55.0)),
    ("is to love what you do. ❞", Rect::new(230.0, 330.0, 255.0, 55.0)),
    ("— Steve Jobs —", Rect::new(310.0, 400.0, 255.0, 55.0)),
];

const LOGO_GROWTH: f32 = 5.0;
/// 缩到几乎不可见，缩放为零会让变换矩阵不可逆。
const VANISH_SCALE: f32 = 0.00001;
const TRANSFORM_DURATION: f32 = 2.0;

/// 开场编排的各个步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cue {
    GrowLogo,
    ShrinkLogo,
    ShrinkBadge,
    ShowQuote(usize),
    HideQuotes,
    OpenStory,
}

const CHOREOGRAPHY: [(f32, Cue); 8] = [
    (0.0, Cue::GrowLogo),
    (2.25, Cue::ShrinkLogo),
    (4.5, Cue::ShrinkBadge),
    (6.75, Cue::ShowQuote(0)),
    (8.0, Cue::ShowQuote(1)),
    (9.75, Cue::ShowQuote(2)),
    (11.5, Cue::HideQuotes),
    (13.25, Cue::OpenStory),
];

/// 故事推进一步的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryStep {
    pub sentence: &'static str,
    /// 已到倒数第二句之后，应当换成 Explore 按钮。
    pub reveals_explore: bool,
}

/// 固定的几句故事与当前进度。
#[derive(Debug, Clone)]
pub struct Story {
    sentences: &'static [&'static str],
    count: usize,
}

impl Default for Story {
    fn default() -> Self {
        Self::new(&STORY)
    }
}

impl Story {
    pub fn new(sentences: &'static [&'static str]) -> Self {
        Self {
            sentences,
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn current(&self) -> &'static str {
        self.sentences.get(self.count).copied().unwrap_or_default()
    }

    /// 前进到下一句。已是最后一句时返回 `None`。
    pub fn advance(&mut self) -> Option<StoryStep> {
        let next = self.count + 1;
        let sentence = *self.sentences.get(next)?;
        let reveals_explore = next >= self.sentences.len().saturating_sub(1);
        self.count = next;
        Some(StoryStep {
            sentence,
            reveals_explore,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct IntroViews {
    logo: ElementId,
    badge: ElementId,
    quotes: [ElementId; 3],
    popup: ElementId,
    story_label: ElementId,
    next: ElementId,
    explore: ElementId,
}

impl IntroViews {
    fn build(overlay: &mut Overlay, story: &Story) -> Result<Self> {
        let logo = overlay.add(Element::image(LOGO_FRAME, LOGO));
        let badge = overlay.add(
            Element::plain(BADGE_FRAME, BADGE_COLOR).with_corner_radius(BADGE_CORNER_RADIUS),
        );
        let quotes = QUOTES.map(|(text, frame)| overlay.add(stage::thin_label(frame, text, QUOTE_SIZE)));

        let popup = overlay.add(Element::image(POPUP_FRAME, POPUP_WINDOW).with_alpha(0.0));
        let story_label = overlay.add_child(popup, stage::popup_text(story.current(), STORY_LINES))?;
        let next = overlay
            .add(Element::button(POPUP_FRAME, ButtonContent::image(NEXT_BUTTON)).with_alpha(0.0));
        let explore = overlay.add(stage::bottom_button("Explore", 2.5));

        Ok(Self {
            logo,
            badge,
            quotes,
            popup,
            story_label,
            next,
            explore,
        })
    }

    fn play(&self, cue: Cue, overlay: &mut Overlay) {
        match cue {
            Cue::GrowLogo => overlay.animate(TRANSFORM_DURATION, |o| {
                o.set_scale(self.logo, LOGO_GROWTH);
                o.set_rotation(self.badge, PI);
            }),
            Cue::ShrinkLogo => overlay.animate(TRANSFORM_DURATION, |o| {
                o.set_scale(self.logo, VANISH_SCALE);
            }),
            // 新变换只有缩放，之前的旋转一并复位
            Cue::ShrinkBadge => overlay.animate(TRANSFORM_DURATION, |o| {
                o.set_scale(self.badge, VANISH_SCALE);
                o.set_rotation(self.badge, 0.0);
            }),
            Cue::ShowQuote(index) => {
                if let Some(quote) = self.quotes.get(index).copied() {
                    overlay.animate(FADE_DURATION, |o| o.set_alpha(quote, 1.0));
                }
            }
            Cue::HideQuotes => overlay.animate(FADE_DURATION, |o| {
                for quote in self.quotes {
                    o.set_alpha(quote, 0.0);
                }
            }),
            Cue::OpenStory => overlay.animate(FADE_DURATION, |o| {
                o.set_alpha(self.popup, 1.0);
                o.set_alpha(self.next, 1.0);
                o.set_enabled(self.next, true);
            }),
        }
    }
}

/// 开场控制器，也是控制器栈的根。
pub struct IntroController {
    story: Story,
    timeline: Timeline<Cue>,
    confirmation: Option<Sound>,
    views: Option<IntroViews>,
}

impl Default for IntroController {
    fn default() -> Self {
        Self::new()
    }
}

impl IntroController {
    pub fn new() -> Self {
        Self {
            story: Story::default(),
            timeline: Timeline::new(),
            confirmation: None,
            views: None,
        }
    }

    fn continue_story(&mut self, view: &mut View, views: IntroViews, context: &AppContext) {
        if let Some(sound) = &self.confirmation
            && let Err(err) = context.audio.play(sound)
        {
            warn!(target: "celestial", error = %err, "failed to play sound effect");
        }

        let Some(step) = self.story.advance() else {
            debug!(target: "celestial", "story already finished");
            return;
        };
        debug!(target: "celestial", count = self.story.count(), "continue story");

        if step.reveals_explore {
            view.overlay.animate(FADE_DURATION, |o| {
                o.set_alpha(views.next, 0.0);
                o.set_enabled(views.next, false);
                o.set_alpha(views.explore, 1.0);
                o.set_enabled(views.explore, true);
            });
        }
        view.overlay.set_text(views.story_label, step.sentence);
    }
}

#[async_trait]
impl ViewController for IntroController {
    fn name(&self) -> &str {
        "intro"
    }

    async fn load(&mut self, view: &mut View, context: &AppContext) -> Result<()> {
        self.confirmation = match Sound::load(&context.bundle, CONFIRMATION_SOUND) {
            Ok(sound) => Some(sound),
            Err(err) => {
                warn!(target: "celestial", error = %err, "Couldn't find sound effect file.");
                None
            }
        };

        view.background = Color::BLACK;
        self.views = Some(IntroViews::build(&mut view.overlay, &self.story)?);
        for (after, cue) in CHOREOGRAPHY {
            self.timeline.schedule(after, cue);
        }
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
        for cue in self.timeline.advance(delta) {
            debug!(target: "celestial", ?cue, "intro cue");
            views.play(cue, &mut view.overlay);
        }
        Ok(None)
    }

    fn on_event(
        &mut self,
        view: &mut View,
        event: &Event,
        context: &AppContext,
    ) -> Result<Option<Transition>> {
        let (Some(views), Event::ButtonPressed(button)) = (self.views, event) else {
            return Ok(None);
        };

        if *button == views.next {
            self.continue_story(view, views, context);
        } else if *button == views.explore {
            return Ok(Some(Transition::Present(Box::new(MainController::new()))));
        }
        Ok(None)
    }
}
