//! The render pipeline: clipping, linetype and backend stages in front of
//! a backend.

use cadplot_clip::ClipShape;
use cadplot_geom::{Path2d, Points2d};
use cadplot_math::{Affine2, Point2};
use log::warn;

use crate::backend::{Backend, ImageData};
use crate::color::Color;
use crate::config::Configuration;
use crate::properties::Properties;
use crate::resolver::RenderContext;
use crate::stages::{BackendStage, ClippingStage, LinetypeStage, RenderStage};
use crate::{RenderError, Result};

/// The stage chain of a [`RenderPipeline`].
pub type StageChain<B> = ClippingStage<LinetypeStage<BackendStage<B>>>;

/// Smallest viewport scale used for linetype scaling, 1:10000.
const MIN_VIEWPORT_SCALE: f64 = 0.0001;

/// Entry point for resolved drawing primitives.
#[derive(Debug)]
pub struct RenderPipeline<B> {
    stages: StageChain<B>,
    config: Configuration,
    current_vp_scale: f64,
}

impl<B: Backend> RenderPipeline<B> {
    /// Pipeline with the default configuration; call
    /// [`RenderPipeline::configure`] before drawing.
    pub fn new(backend: B) -> Self {
        Self {
            stages: ClippingStage::new(LinetypeStage::new(BackendStage::new(backend))),
            config: Configuration::default(),
            current_vp_scale: 1.0,
        }
    }

    /// Configure the backend and every stage.
    pub fn configure(&mut self, config: Configuration) {
        self.backend_stage_mut().backend_mut().configure(&config);
        self.stages.set_config(&config);
        self.config = config;
    }

    /// The current configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    fn backend_stage(&self) -> &BackendStage<B> {
        self.stages.next().next()
    }

    fn backend_stage_mut(&mut self) -> &mut BackendStage<B> {
        self.stages.next_mut().next_mut()
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        self.backend_stage().backend()
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        self.backend_stage_mut().backend_mut()
    }

    /// Consume the pipeline and return the backend.
    pub fn into_backend(self) -> B {
        self.stages.into_next().into_next().into_backend()
    }

    /// Handle attached to the following primitives.
    pub fn set_current_entity_handle(&mut self, handle: &str) {
        self.backend_stage_mut().set_current_entity_handle(handle);
    }

    /// Start the primitives of an entity.
    pub fn enter_entity(&mut self, handle: &str) {
        self.set_current_entity_handle(handle);
        self.backend_mut().enter_entity(handle);
    }

    /// End the primitives of an entity.
    pub fn exit_entity(&mut self, handle: &str) {
        self.backend_mut().exit_entity(handle);
        self.set_current_entity_handle("");
    }

    /// Push a clip shape; `transform` maps the following geometry into the
    /// coordinate system of the shape.
    pub fn push_clipping_shape(&mut self, shape: ClipShape, transform: Option<Affine2>) {
        self.stages.stack_mut().push(shape, transform);
    }

    /// Remove the topmost clip shape.
    pub fn pop_clipping_shape(&mut self) {
        self.stages.stack_mut().pop();
    }

    /// Scale of the current viewport; linetype patterns are scaled by the
    /// inverse so dashes look the same in every viewport.
    pub fn set_viewport_scale(&mut self, scale: f64) {
        self.current_vp_scale = scale;
        let ltype_scale = self.vp_ltype_scale();
        self.stages.next_mut().set_ltype_scale(ltype_scale);
    }

    /// Linetype scale of the current viewport.
    pub fn vp_ltype_scale(&self) -> f64 {
        1.0 / self.current_vp_scale.max(MIN_VIEWPORT_SCALE)
    }

    /// Set the layout background, mapped by the background policy.
    pub fn set_background(&mut self, color: Color) {
        let color = self.config.background_color(color);
        self.backend_mut().set_background(color);
    }

    /// Draw a point.
    pub fn draw_point(&mut self, pos: Point2, properties: &Properties) {
        self.stages.draw_point(pos, properties);
    }

    /// Draw a line.
    pub fn draw_line(&mut self, start: Point2, end: Point2, properties: &Properties) {
        self.stages.draw_line(start, end, properties);
    }

    /// Draw solid line segments, linetypes are not applied.
    pub fn draw_solid_lines(&mut self, lines: Vec<(Point2, Point2)>, properties: &Properties) {
        self.stages.draw_solid_lines(lines, properties);
    }

    /// Draw a path.
    pub fn draw_path(&mut self, path: Path2d, properties: &Properties) {
        self.stages.draw_path(path, properties);
    }

    /// Draw filled paths with holes.
    pub fn draw_filled_paths(&mut self, paths: Vec<Path2d>, properties: &Properties) {
        self.stages.draw_filled_paths(paths, properties);
    }

    /// Draw a filled polygon.
    pub fn draw_filled_polygon(&mut self, points: Points2d, properties: &Properties) {
        self.stages.draw_filled_polygon(points, properties);
    }

    /// Draw a raster image.
    pub fn draw_image(&mut self, image: ImageData, properties: &Properties) {
        self.stages.draw_image(image, properties);
    }

    /// Finalize the backend and verify that all clip shapes and block
    /// reference states of `ctx` were popped.
    pub fn finalize(&mut self, ctx: &RenderContext) -> Result<()> {
        self.backend_mut().finalize();
        let depth = self.stages.stack().depth();
        if depth > 0 {
            warn!("{depth} clip shape(s) left on the clip stack");
            return Err(RenderError::UnbalancedState(depth));
        }
        ctx.verify_balanced().inspect_err(|err| warn!("{err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PixelBuffer;
    use crate::config::{BackgroundPolicy, ColorPolicy, LinePolicy};
    use crate::properties::BackendProperties;

    #[derive(Debug, Default)]
    struct CallLog {
        calls: Vec<String>,
        colors: Vec<Color>,
        handles: Vec<String>,
        configured: bool,
        finalized: bool,
    }

    impl CallLog {
        fn log(&mut self, call: &str, properties: &BackendProperties) {
            self.calls.push(call.to_string());
            self.colors.push(properties.color);
            self.handles.push(properties.handle.clone());
        }
    }

    impl Backend for CallLog {
        fn configure(&mut self, _config: &Configuration) {
            self.configured = true;
        }

        fn set_background(&mut self, color: Color) {
            self.calls.push(format!("background {color}"));
        }

        fn draw_point(&mut self, _pos: Point2, properties: &BackendProperties) {
            self.log("point", properties);
        }

        fn draw_line(&mut self, _start: Point2, _end: Point2, properties: &BackendProperties) {
            self.log("line", properties);
        }

        fn draw_solid_lines(&mut self, lines: &[(Point2, Point2)], properties: &BackendProperties) {
            self.log(&format!("solid_lines {}", lines.len()), properties);
        }

        fn draw_path(&mut self, _path: &Path2d, properties: &BackendProperties) {
            self.log("path", properties);
        }

        fn draw_filled_paths(&mut self, paths: &[Path2d], properties: &BackendProperties) {
            self.log(&format!("filled_paths {}", paths.len()), properties);
        }

        fn draw_filled_polygon(&mut self, points: &Points2d, properties: &BackendProperties) {
            self.log(&format!("filled_polygon {}", points.len()), properties);
        }

        fn draw_image(&mut self, _image: &ImageData, properties: &BackendProperties) {
            self.log("image", properties);
        }

        fn clear(&mut self) {
            self.calls.clear();
        }

        fn finalize(&mut self) {
            self.finalized = true;
        }
    }

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn dashed() -> Properties {
        Properties {
            linetype_name: "DASHED".into(),
            linetype_pattern: vec![1.0, 1.0],
            color: Color::rgba(200, 10, 10, 0x80),
            ..Default::default()
        }
    }

    fn pipeline(config: Configuration) -> RenderPipeline<CallLog> {
        let mut pipeline = RenderPipeline::new(CallLog::default());
        pipeline.configure(config);
        pipeline
    }

    #[test]
    fn test_configure_reaches_backend() {
        let pipeline = pipeline(Configuration::default());
        assert!(pipeline.backend().configured);
    }

    #[test]
    fn test_linetype_expansion() {
        let mut pipeline = pipeline(Configuration::default());
        pipeline.draw_line(p(0.0, 0.0), p(10.0, 0.0), &dashed());
        pipeline.draw_line(p(0.0, 0.0), p(10.0, 0.0), &Properties::default());
        assert_eq!(pipeline.backend().calls, vec!["solid_lines 5", "line"]);
    }

    #[test]
    fn test_solid_policy_bypasses_linetypes() {
        let mut pipeline = pipeline(Configuration::default().with_line_policy(LinePolicy::Solid));
        pipeline.draw_line(p(0.0, 0.0), p(10.0, 0.0), &dashed());
        assert_eq!(pipeline.backend().calls, vec!["line"]);
    }

    #[test]
    fn test_viewport_scale_changes_dash_length() {
        let mut pipeline = pipeline(Configuration::default());
        pipeline.set_viewport_scale(2.0);
        assert_eq!(pipeline.vp_ltype_scale(), 0.5);
        pipeline.draw_line(p(0.0, 0.0), p(10.0, 0.0), &dashed());
        assert_eq!(pipeline.backend().calls, vec!["solid_lines 10"]);
        pipeline.set_viewport_scale(0.0);
        assert_eq!(pipeline.vp_ltype_scale(), 10000.0);
    }

    #[test]
    fn test_dashed_path() {
        let mut pipeline = pipeline(Configuration::default());
        let path = Path2d::from_vertices([p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0)], false);
        pipeline.draw_path(path, &dashed());
        assert_eq!(pipeline.backend().calls, vec!["solid_lines 4"]);
    }

    #[test]
    fn test_force_black_keeps_alpha() {
        let mut pipeline = pipeline(Configuration::default().with_color_policy(ColorPolicy::Black, None));
        pipeline.draw_point(p(0.0, 0.0), &dashed());
        pipeline.draw_filled_polygon(
            Points2d::new(vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]),
            &dashed(),
        );
        for color in &pipeline.backend().colors {
            assert_eq!(color.to_hex(), "#00000080");
        }
    }

    #[test]
    fn test_clipping_drops_invisible_geometry() {
        let mut pipeline = pipeline(Configuration::default());
        let shape = ClipShape::rect(&[p(0.0, 0.0), p(5.0, 5.0)]).unwrap();
        pipeline.push_clipping_shape(shape, None);
        let props = Properties::default();
        pipeline.draw_point(p(6.0, 6.0), &props);
        pipeline.draw_line(p(-5.0, 1.0), p(10.0, 1.0), &props);
        pipeline.draw_filled_polygon(
            Points2d::new(vec![p(10.0, 10.0), p(11.0, 10.0), p(11.0, 11.0)]),
            &props,
        );
        pipeline.draw_solid_lines(vec![(p(7.0, 7.0), p(8.0, 8.0))], &props);
        pipeline.pop_clipping_shape();
        assert_eq!(pipeline.backend().calls, vec!["line"]);
    }

    #[test]
    fn test_invisible_properties_are_dropped() {
        let mut pipeline = pipeline(Configuration::default());
        let props = Properties {
            is_visible: false,
            ..Default::default()
        };
        pipeline.draw_line(p(0.0, 0.0), p(1.0, 0.0), &props);
        let image = ImageData::new(PixelBuffer::filled(2, 2, Color::WHITE), Affine2::identity());
        pipeline.draw_image(image, &props);
        assert!(pipeline.backend().calls.is_empty());
    }

    #[test]
    fn test_degenerate_primitives_are_dropped() {
        let mut pipeline = pipeline(Configuration::default());
        let props = Properties::default();
        pipeline.draw_line(p(1.0, 1.0), p(1.0, 1.0), &props);
        pipeline.draw_filled_polygon(Points2d::new(vec![p(0.0, 0.0), p(1.0, 0.0)]), &props);
        pipeline.draw_filled_polygon(
            Points2d::new(vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)]),
            &props,
        );
        pipeline.draw_path(Path2d::new(p(3.0, 3.0)), &props);
        pipeline.draw_filled_paths(vec![Path2d::new(p(3.0, 3.0))], &props);
        pipeline.draw_solid_lines(vec![(p(2.0, 2.0), p(2.0, 2.0))], &props);
        assert!(pipeline.backend().calls.is_empty());
    }

    #[test]
    fn test_degenerate_parts_are_dropped_from_mixed_input() {
        let mut pipeline = pipeline(Configuration::default());
        let props = Properties::default();
        pipeline.draw_solid_lines(vec![(p(2.0, 2.0), p(2.0, 2.0)), (p(0.0, 0.0), p(1.0, 0.0))], &props);
        let square = Path2d::from_vertices([p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)], true);
        pipeline.draw_filled_paths(vec![Path2d::new(p(3.0, 3.0)), square], &props);
        assert_eq!(pipeline.backend().calls, vec!["solid_lines 1", "filled_paths 1"]);
    }

    #[test]
    fn test_clipped_line_touching_a_corner_is_dropped() {
        let mut pipeline = pipeline(Configuration::default());
        let shape = ClipShape::rect(&[p(0.0, 0.0), p(5.0, 5.0)]).unwrap();
        pipeline.push_clipping_shape(shape, None);
        pipeline.draw_line(p(4.0, 6.0), p(6.0, 4.0), &Properties::default());
        pipeline.pop_clipping_shape();
        assert!(pipeline.backend().calls.is_empty());
    }

    #[test]
    fn test_pattern_without_length_draws_solid_lines() {
        let mut pipeline = pipeline(Configuration::default().with_min_dash_length(0.0));
        let props = Properties {
            linetype_name: "ZERO".into(),
            linetype_pattern: vec![0.0, 0.0],
            ..Default::default()
        };
        pipeline.draw_line(p(0.0, 0.0), p(10.0, 0.0), &props);
        pipeline.draw_path(Path2d::from_vertices([p(0.0, 0.0), p(4.0, 0.0)], false), &props);
        assert_eq!(pipeline.backend().calls, vec!["line", "path"]);
    }

    #[test]
    fn test_entity_handles() {
        let mut pipeline = pipeline(Configuration::default());
        pipeline.enter_entity("2F");
        pipeline.draw_point(p(0.0, 0.0), &Properties::default());
        pipeline.exit_entity("2F");
        pipeline.draw_point(p(0.0, 0.0), &Properties::default());
        assert_eq!(pipeline.backend().handles, vec!["2F", ""]);
    }

    #[test]
    fn test_background_policy() {
        let config = Configuration::default().with_background_policy(BackgroundPolicy::Black, None);
        let mut pipeline = pipeline(config);
        pipeline.set_background(Color::WHITE);
        assert_eq!(pipeline.backend().calls, vec!["background #000000"]);
    }

    #[test_log::test]
    fn test_finalize_verifies_balance() {
        let mut pipeline = pipeline(Configuration::default());
        let mut ctx = RenderContext::new();
        let shape = ClipShape::rect(&[p(0.0, 0.0), p(5.0, 5.0)]).unwrap();
        pipeline.push_clipping_shape(shape, None);
        assert!(matches!(pipeline.finalize(&ctx), Err(RenderError::UnbalancedState(1))));
        pipeline.pop_clipping_shape();
        ctx.push_state(Properties::default());
        assert!(matches!(pipeline.finalize(&ctx), Err(RenderError::UnbalancedState(1))));
        ctx.pop_state();
        assert!(pipeline.finalize(&ctx).is_ok());
        assert!(pipeline.backend().finalized);
    }
}
