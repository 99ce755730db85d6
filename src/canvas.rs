use crate::types::{BlendMode, Color, Matrix, Pt, Shading};

/// Back-reference to a group, pattern, soft mask or shading recorded by a [`Canvas`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceRgb,
    Pattern,
}

/// Which paint operator a color or alpha setter targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintTarget {
    Fill,
    Stroke,
    Both,
}

impl PaintTarget {
    pub fn from_stroke(stroke: bool) -> Self {
        if stroke {
            PaintTarget::Stroke
        } else {
            PaintTarget::Fill
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    ConcatMatrix {
        a: f32,
        b: f32,
        c: f32,
        d: f32,
        e: Pt,
        f: Pt,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetColorSpace {
        space: ColorSpace,
        stroke: bool,
    },
    // Selects a recorded pattern as the current fill or stroke paint.
    SetPattern {
        pattern: ObjectId,
        stroke: bool,
    },
    SetAlpha {
        target: PaintTarget,
        alpha: f32,
    },
    SetBlendMode(BlendMode),
    // Luminosity soft mask taken from a recorded mask stream.
    SetSoftMask(ObjectId),
    SetLineWidth(Pt),
    SetLineCap(u8),
    SetLineJoin(u8),
    SetMiterLimit(Pt),
    SetDash {
        pattern: Vec<Pt>,
        phase: Pt,
    },
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    CurveTo {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
        x: Pt,
        y: Pt,
    },
    ClosePath,
    Rectangle {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    // Clip to the current path (W/W*). Followed by EndPath.
    ClipPath {
        evenodd: bool,
    },
    EndPath,
    Fill,
    FillEvenOdd,
    Stroke,
    FillStroke,
    FillStrokeEvenOdd,
    PaintShading(ObjectId),
    BeginText,
    EndText,
    SetTextRendering(u8),
    ShowText(GlyphRun),
    DrawXObject(ObjectId),
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

/// One positioned run of shaped text.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub matrix: [f32; 6],
    pub font: String,
    pub size: Pt,
    pub text: String,
    pub glyph_ids: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    // x0, y0, x1, y1
    pub bbox: [f32; 4],
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternTile {
    pub bbox: [f32; 4],
    pub x_step: f32,
    pub y_step: f32,
    pub matrix: Matrix,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoftMask {
    pub bbox: [f32; 4],
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Group(Group),
    Pattern(PatternTile),
    SoftMask(SoftMask),
    Shading(Shading),
}

/// Finished recording: the top-level stream plus every resource, indexed by [`ObjectId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub commands: Vec<Command>,
    pub resources: Vec<Resource>,
}

impl Drawing {
    pub fn resource(&self, id: ObjectId) -> Option<&Resource> {
        self.resources.get(id.0 as usize)
    }

    /// Top-level commands followed by the commands of every stream resource.
    pub fn all_commands(&self) -> impl Iterator<Item = &Command> {
        let nested = self.resources.iter().flat_map(|resource| {
            let commands: &[Command] = match resource {
                Resource::Group(group) => &group.commands,
                Resource::Pattern(tile) => &tile.commands,
                Resource::SoftMask(mask) => &mask.commands,
                Resource::Shading(_) => &[],
            };
            commands.iter()
        });
        self.commands.iter().chain(nested)
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    // None once a pattern paint replaced the plain color.
    fill_color: Option<Color>,
    stroke_color: Option<Color>,
    line_width: Pt,
    line_cap: u8,
    line_join: u8,
}

impl GraphicsState {
    fn initial(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill_color: Some(Color::BLACK),
            stroke_color: Some(Color::BLACK),
            line_width: Pt::from_f32(1.0),
            line_cap: 0,
            line_join: 0,
        }
    }
}

#[derive(Debug, Clone)]
enum StreamKind {
    Root,
    Group { bbox: [f32; 4] },
    Pattern {
        bbox: [f32; 4],
        x_step: f32,
        y_step: f32,
        matrix: Matrix,
    },
    SoftMask { bbox: [f32; 4] },
}

#[derive(Debug)]
struct Stream {
    id: Option<ObjectId>,
    kind: StreamKind,
    commands: Vec<Command>,
    state_stack: Vec<GraphicsState>,
    state: GraphicsState,
    // A path is being built and has not been painted or discarded yet.
    path_open: bool,
}

/// Recording drawing surface. Group, pattern and soft-mask streams nest: while
/// one is open, every drawing call lands in it instead of the parent stream.
pub struct Canvas {
    streams: Vec<Stream>,
    resources: Vec<Option<Resource>>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            streams: vec![Stream {
                id: None,
                kind: StreamKind::Root,
                commands: Vec::new(),
                state_stack: Vec::new(),
                state: GraphicsState::initial(Matrix::identity()),
                path_open: false,
            }],
            resources: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Stream {
        let last = self.streams.len() - 1;
        &mut self.streams[last]
    }

    fn push(&mut self, command: Command) {
        self.current().commands.push(command);
    }

    fn push_path(&mut self, command: Command) {
        let stream = self.current();
        stream.path_open = true;
        stream.commands.push(command);
    }

    fn push_paint(&mut self, command: Command) {
        let stream = self.current();
        stream.path_open = false;
        stream.commands.push(command);
    }

    fn reserve(&mut self) -> ObjectId {
        let id = ObjectId(self.resources.len() as u32);
        self.resources.push(None);
        id
    }

    fn open_stream(&mut self, kind: StreamKind, ctm: Matrix) -> ObjectId {
        let id = self.reserve();
        self.streams.push(Stream {
            id: Some(id),
            kind,
            commands: Vec::new(),
            state_stack: Vec::new(),
            state: GraphicsState::initial(ctm),
            path_open: false,
        });
        id
    }

    fn close_stream(&mut self) -> Option<ObjectId> {
        if self.streams.len() < 2 {
            return None;
        }
        let stream = self.streams.pop()?;
        let id = stream.id?;
        let resource = match stream.kind {
            StreamKind::Root => return None,
            StreamKind::Group { bbox } => Resource::Group(Group {
                bbox,
                commands: stream.commands,
            }),
            StreamKind::Pattern {
                bbox,
                x_step,
                y_step,
                matrix,
            } => Resource::Pattern(PatternTile {
                bbox,
                x_step,
                y_step,
                matrix,
                commands: stream.commands,
            }),
            StreamKind::SoftMask { bbox } => Resource::SoftMask(SoftMask {
                bbox,
                commands: stream.commands,
            }),
        };
        self.resources[id.0 as usize] = Some(resource);
        Some(id)
    }

    /// Current transformation matrix of the open stream.
    pub fn ctm(&self) -> Matrix {
        self.streams
            .last()
            .map(|stream| stream.state.ctm)
            .unwrap_or_default()
    }

    /// Nesting depth of open group/pattern/mask streams (0 at top level).
    pub fn stream_depth(&self) -> usize {
        self.streams.len() - 1
    }

    pub fn push_state(&mut self) {
        let stream = self.current();
        stream.state_stack.push(stream.state.clone());
        stream.commands.push(Command::SaveState);
    }

    pub fn pop_state(&mut self) {
        let stream = self.current();
        if let Some(state) = stream.state_stack.pop() {
            stream.state = state;
            stream.commands.push(Command::RestoreState);
        }
    }

    pub fn transform(&mut self, matrix: Matrix) {
        if matrix.is_identity() {
            return;
        }
        let stream = self.current();
        stream.state.ctm = matrix * stream.state.ctm;
        stream.commands.push(Command::ConcatMatrix {
            a: matrix.a,
            b: matrix.b,
            c: matrix.c,
            d: matrix.d,
            e: Pt::from_f32(matrix.e),
            f: Pt::from_f32(matrix.f),
        });
    }

    pub fn begin_group(&mut self, bbox: [f32; 4]) -> ObjectId {
        let ctm = self.ctm();
        self.open_stream(StreamKind::Group { bbox }, ctm)
    }

    pub fn end_group(&mut self) -> Option<ObjectId> {
        self.close_stream()
    }

    /// Replaces the bounding box of a group that is already closed.
    pub fn set_group_bbox(&mut self, id: ObjectId, bbox: [f32; 4]) {
        if let Some(Some(Resource::Group(group))) = self.resources.get_mut(id.0 as usize) {
            group.bbox = bbox;
        }
    }

    pub fn begin_pattern(
        &mut self,
        bbox: [f32; 4],
        x_step: f32,
        y_step: f32,
        matrix: Matrix,
    ) -> ObjectId {
        self.open_stream(
            StreamKind::Pattern {
                bbox,
                x_step,
                y_step,
                matrix,
            },
            matrix,
        )
    }

    pub fn end_pattern(&mut self) -> Option<ObjectId> {
        self.close_stream()
    }

    pub fn begin_soft_mask(&mut self, bbox: [f32; 4]) -> ObjectId {
        let ctm = self.ctm();
        self.open_stream(StreamKind::SoftMask { bbox }, ctm)
    }

    pub fn end_soft_mask(&mut self) -> Option<ObjectId> {
        self.close_stream()
    }

    pub fn set_soft_mask(&mut self, mask: ObjectId) {
        self.push(Command::SetSoftMask(mask));
    }

    pub fn add_shading(&mut self, shading: Shading) -> ObjectId {
        let id = self.reserve();
        self.resources[id.0 as usize] = Some(Resource::Shading(shading));
        id
    }

    pub fn paint_shading(&mut self, shading: ObjectId) {
        self.push(Command::PaintShading(shading));
    }

    pub fn draw_x_object(&mut self, id: ObjectId) {
        self.push(Command::DrawXObject(id));
    }

    pub fn set_color(&mut self, color: Color, stroke: bool) {
        let state = &mut self.current().state;
        let slot = if stroke {
            &mut state.stroke_color
        } else {
            &mut state.fill_color
        };
        if *slot == Some(color) {
            return;
        }
        *slot = Some(color);
        if stroke {
            self.push(Command::SetStrokeColor(color));
        } else {
            self.push(Command::SetFillColor(color));
        }
    }

    pub fn color_space(&mut self, space: ColorSpace, stroke: bool) {
        self.push(Command::SetColorSpace { space, stroke });
    }

    pub fn set_color_special(&mut self, pattern: ObjectId, stroke: bool) {
        let state = &mut self.current().state;
        if stroke {
            state.stroke_color = None;
        } else {
            state.fill_color = None;
        }
        self.push(Command::SetPattern { pattern, stroke });
    }

    pub fn set_alpha(&mut self, alpha: f32, target: PaintTarget) {
        self.push(Command::SetAlpha {
            target,
            alpha: alpha.clamp(0.0, 1.0),
        });
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.push(Command::SetBlendMode(mode));
    }

    pub fn set_line_width(&mut self, width: f32) {
        let width = Pt::from_f32(width.max(0.0));
        let state = &mut self.current().state;
        if state.line_width == width {
            return;
        }
        state.line_width = width;
        self.push(Command::SetLineWidth(width));
    }

    pub fn set_line_cap(&mut self, cap: u8) {
        let state = &mut self.current().state;
        if state.line_cap == cap {
            return;
        }
        state.line_cap = cap;
        self.push(Command::SetLineCap(cap));
    }

    pub fn set_line_join(&mut self, join: u8) {
        let state = &mut self.current().state;
        if state.line_join == join {
            return;
        }
        state.line_join = join;
        self.push(Command::SetLineJoin(join));
    }

    pub fn set_miter_limit(&mut self, limit: f32) {
        self.push(Command::SetMiterLimit(Pt::from_f32(limit.max(0.0))));
    }

    pub fn set_dash(&mut self, pattern: &[f32], phase: f32) {
        let pattern = pattern.iter().map(|value| Pt::from_f32(*value)).collect();
        self.push(Command::SetDash {
            pattern,
            phase: Pt::from_f32(phase),
        });
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.push_path(Command::MoveTo {
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
        });
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.push_path(Command::LineTo {
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
        });
    }

    pub fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.push_path(Command::CurveTo {
            x1: Pt::from_f32(x1),
            y1: Pt::from_f32(y1),
            x2: Pt::from_f32(x2),
            y2: Pt::from_f32(y2),
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
        });
    }

    pub fn close_path(&mut self) {
        self.push(Command::ClosePath);
    }

    pub fn rectangle(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.push_path(Command::Rectangle {
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        });
    }

    pub fn clip(&mut self, evenodd: bool) {
        self.push(Command::ClipPath { evenodd });
    }

    pub fn end_path(&mut self) {
        self.push_paint(Command::EndPath);
    }

    pub fn fill(&mut self, evenodd: bool) {
        self.push_paint(if evenodd {
            Command::FillEvenOdd
        } else {
            Command::Fill
        });
    }

    pub fn stroke(&mut self) {
        self.push_paint(Command::Stroke);
    }

    pub fn fill_and_stroke(&mut self, evenodd: bool) {
        self.push_paint(if evenodd {
            Command::FillStrokeEvenOdd
        } else {
            Command::FillStroke
        });
    }

    pub fn begin_text(&mut self) {
        self.push(Command::BeginText);
    }

    pub fn end_text(&mut self) {
        self.push(Command::EndText);
    }

    pub fn set_text_rendering(&mut self, mode: u8) {
        self.push(Command::SetTextRendering(mode));
    }

    pub fn show_text(&mut self, run: GlyphRun) {
        self.push(Command::ShowText(run));
    }

    pub fn draw_image(&mut self, width: f32, height: f32, resource_id: impl Into<String>) {
        self.push(Command::DrawImage {
            x: Pt::ZERO,
            y: Pt::ZERO,
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
            resource_id: resource_id.into(),
        });
    }

    /// Whether path construction operators were issued since the last
    /// painting or `end_path` operator.
    pub fn has_path(&self) -> bool {
        self.streams.last().is_some_and(|stream| stream.path_open)
    }

    pub fn command_count(&self) -> usize {
        self.streams
            .last()
            .map(|stream| stream.commands.len())
            .unwrap_or(0)
    }

    /// Closes any stream left open and returns the recording.
    pub fn finish(mut self) -> Drawing {
        while self.streams.len() > 1 {
            self.close_stream();
        }
        let commands = self
            .streams
            .pop()
            .map(|stream| stream.commands)
            .unwrap_or_default();
        let resources = self
            .resources
            .into_iter()
            .map(|resource| {
                resource.unwrap_or(Resource::Group(Group {
                    bbox: [0.0; 4],
                    commands: Vec::new(),
                }))
            })
            .collect();
        Drawing {
            commands,
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_content_is_redirected_and_referenced() {
        let mut canvas = Canvas::new();
        canvas.move_to(0.0, 0.0);
        let id = canvas.begin_group([0.0, 0.0, 10.0, 10.0]);
        canvas.line_to(5.0, 5.0);
        assert_eq!(canvas.end_group(), Some(id));
        canvas.draw_x_object(id);
        canvas.set_group_bbox(id, [1.0, 2.0, 3.0, 4.0]);
        let drawing = canvas.finish();
        assert_eq!(drawing.commands.len(), 2);
        assert_eq!(drawing.commands[1], Command::DrawXObject(id));
        match drawing.resource(id) {
            Some(Resource::Group(group)) => {
                assert_eq!(group.bbox, [1.0, 2.0, 3.0, 4.0]);
                assert_eq!(group.commands.len(), 1);
            }
            other => panic!("unexpected resource {other:?}"),
        }
    }

    #[test]
    fn redundant_setters_are_deduplicated_per_state() {
        let mut canvas = Canvas::new();
        canvas.set_color(Color::BLACK, false);
        canvas.set_line_width(1.0);
        assert_eq!(canvas.command_count(), 0);
        canvas.push_state();
        canvas.set_color(Color::rgb(1.0, 0.0, 0.0), false);
        canvas.pop_state();
        canvas.set_color(Color::rgb(1.0, 0.0, 0.0), false);
        let drawing = canvas.finish();
        let fills = drawing
            .commands
            .iter()
            .filter(|command| matches!(command, Command::SetFillColor(_)))
            .count();
        assert_eq!(fills, 2);
    }

    #[test]
    fn painting_consumes_the_current_path() {
        let mut canvas = Canvas::new();
        assert!(!canvas.has_path());
        canvas.rectangle(0.0, 0.0, 1.0, 1.0);
        assert!(canvas.has_path());
        canvas.fill(false);
        assert!(!canvas.has_path());
        canvas.move_to(0.0, 0.0);
        canvas.end_path();
        assert!(!canvas.has_path());
    }

    #[test]
    fn ctm_composes_and_restores() {
        let mut canvas = Canvas::new();
        canvas.push_state();
        canvas.transform(Matrix::translate(10.0, 0.0));
        canvas.transform(Matrix::scale(2.0, 2.0));
        let (x, y) = canvas.ctm().apply(1.0, 1.0);
        assert!((x - 22.0).abs() < 1e-5 && (y - 2.0).abs() < 1e-5);
        canvas.pop_state();
        assert!(canvas.ctm().is_identity());
    }

    #[test]
    fn pattern_color_invalidates_plain_color_cache() {
        let mut canvas = Canvas::new();
        let id = canvas.begin_pattern([0.0, 0.0, 1.0, 1.0], 1.0, 1.0, Matrix::identity());
        canvas.end_pattern();
        canvas.set_color_special(id, false);
        canvas.set_color(Color::BLACK, false);
        let drawing = canvas.finish();
        assert!(drawing.commands.contains(&Command::SetFillColor(Color::BLACK)));
    }
}
