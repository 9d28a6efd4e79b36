//! One pointer gesture against the displayed paths.
//!
//! Both tools run through a single state machine: the edit tool moves keys
//! and tangent handles and rubber-bands a marquee, the draw tool adds keys,
//! free-draws ahead of the current time and reshapes key runs along a
//! stroke. A gesture spans press, any number of drags and one release.

use std::time::Instant;

use glam::{DMat4, DVec2, DVec3};
use log::warn;

use crate::config::{DrawMode, Settings, StrokeMode};
use crate::edit::stroke::{self, MAX_SKIPPED, STROKE_POINT_SPACING};
use crate::edit::{Modifiers, MouseButton, world_position_from_proj_point};
use crate::hit::{HitTester, Marquee, PathHit, SelectionMode};
use crate::host::{CameraSource, TangentDir, UndoRecorder, Viewport};
use crate::manager::PathManager;
use crate::path::CameraContext;

/// Which tool the session runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    Edit,
    Draw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    None,
    FrameEdit,
    TangentEdit,
    ClickAddWorld,
    Draw,
    Stroke,
    Marquee,
}

/// Per-event environment the embedding layer supplies.
pub struct SessionContext<'a> {
    pub viewport: &'a dyn Viewport,
    pub camera: Option<&'a dyn CameraSource>,
    pub settings: &'a Settings,
    pub now: f64,
    /// Host timeline end; drawing past it still keys but warns.
    pub timeline_max: f64,
}

/// What a finished gesture asks of the embedding layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionOutcome {
    None,
    /// A marquee completed over empty space; combine it with the scene
    /// selection using `mode`.
    Marquee { rect: Marquee, mode: SelectionMode },
}

pub struct EditSession {
    tool: ToolKind,
    mode: Mode,
    selected_path: Option<usize>,
    started_recording: bool,

    initial: DVec2,
    marquee_end: DVec2,
    camera_position: DVec3,
    inverse_camera_matrix: DMat4,

    key_world_position: DVec3,
    last_world_position: DVec3,
    tangent_world_position: DVec3,
    last_selected_time: f64,
    selected_tangent: TangentDir,
    along_preferred_axis: bool,
    pref_edit_axis: u8,
    selection_mode: SelectionMode,

    selected_time: f64,
    stepped_time: f64,
    max_time: f64,
    last_step: Instant,
    stroke_points: Vec<DVec2>,
}

impl EditSession {
    #[must_use]
    pub fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            mode: Mode::None,
            selected_path: None,
            started_recording: false,
            initial: DVec2::ZERO,
            marquee_end: DVec2::ZERO,
            camera_position: DVec3::ZERO,
            inverse_camera_matrix: DMat4::IDENTITY,
            key_world_position: DVec3::ZERO,
            last_world_position: DVec3::ZERO,
            tangent_world_position: DVec3::ZERO,
            last_selected_time: 0.0,
            selected_tangent: TangentDir::In,
            along_preferred_axis: false,
            pref_edit_axis: 0,
            selection_mode: SelectionMode::Replace,
            selected_time: 0.0,
            stepped_time: 0.0,
            max_time: 0.0,
            last_step: Instant::now(),
            stroke_points: Vec::new(),
        }
    }

    #[must_use]
    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.mode == Mode::None && self.selected_path.is_none()
    }

    fn clear_gesture(&mut self) {
        self.mode = Mode::None;
        self.selected_path = None;
        self.started_recording = false;
        self.along_preferred_axis = false;
        self.pref_edit_axis = 0;
        self.stroke_points.clear();
    }

    fn camera_space(ctx: &SessionContext<'_>) -> bool {
        ctx.settings.draw_mode == DrawMode::CameraSpace
    }

    /// Camera-space display position back to true world space, at `time`.
    fn camera_space_to_world(
        &self,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        position: DVec3,
        time: f64,
    ) -> DVec3 {
        let Some(source) = ctx.camera else {
            return position;
        };
        let world_at_time = manager
            .camera_cache_mut()
            .ensure_at(source, time, false)
            .inverse();
        world_at_time.transform_point3(self.inverse_camera_matrix.transform_point3(position))
    }

    // ===== Press =====

    /// Returns whether the event grabbed something.
    pub fn press(
        &mut self,
        cursor: DVec2,
        button: MouseButton,
        modifiers: Modifiers,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) -> bool {
        self.clear_gesture();
        self.initial = cursor;
        self.marquee_end = cursor;

        if !ctx.settings.show_key_frames {
            return false;
        }
        // Locked mode freezes the tracked set; the interactive variant still
        // lets the tools touch it.
        if ctx.settings.locked_mode && !ctx.settings.locked_mode_interactive {
            return false;
        }

        let camera_matrix = ctx.viewport.camera_matrix();
        self.camera_position = camera_matrix.w_axis.truncate();
        self.inverse_camera_matrix = camera_matrix.inverse();

        match self.tool {
            ToolKind::Edit => self.press_edit(cursor, button, modifiers, manager, ctx),
            ToolKind::Draw => self.press_draw(cursor, button, modifiers, manager, ctx, rec),
        }
    }

    fn hit_any_path(
        &self,
        cursor: DVec2,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
    ) -> Option<(usize, PathHit)> {
        let camera_space = Self::camera_space(ctx);
        let (paths, cache) = manager.split_paths_and_camera();
        let mut cam_ctx = if camera_space {
            ctx.camera
                .map(|source| CameraContext::new(cache, source, ctx.now))
        } else {
            None
        };
        let tester = HitTester::new(ctx.viewport, ctx.settings);
        tester.first_path_hit(cursor, paths, cam_ctx.as_mut())
    }

    fn path_editable(manager: &PathManager, index: usize) -> bool {
        manager.path(index).is_some_and(|path| {
            if path.is_constrained() {
                warn!("{}: translation is constrained, not editable", path.object().name());
                return false;
            }
            if path.object().has_animation_layers() {
                warn!(
                    "{}: channels sit on animation layers, not editable",
                    path.object().name()
                );
                return false;
            }
            true
        })
    }

    fn press_edit(
        &mut self,
        cursor: DVec2,
        button: MouseButton,
        modifiers: Modifiers,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
    ) -> bool {
        let Some((path_index, hit)) = self.hit_any_path(cursor, manager, ctx) else {
            self.mode = Mode::Marquee;
            self.selection_mode = SelectionMode::from_modifiers(modifiers);
            return true;
        };

        self.selected_path = Some(path_index);
        if let Some(path) = manager.path_mut(path_index) {
            path.set_selected_from_tool(true);
        }

        match hit {
            PathHit::Keyframe { time } => {
                if !Self::path_editable(manager, path_index) {
                    return true;
                }

                self.mode = Mode::FrameEdit;
                if button == MouseButton::Middle {
                    self.along_preferred_axis = true;
                    self.pref_edit_axis = u8::from(modifiers.contains(Modifiers::CTRL));
                }

                self.last_selected_time = time;
                modify_selection(
                    manager,
                    path_index,
                    &[time],
                    modifiers.contains(Modifiers::CTRL),
                    modifiers.contains(Modifiers::SHIFT),
                );

                if let Some(path) = manager.path(path_index) {
                    self.key_world_position = path.key_world_position(time).unwrap_or_default();
                }
                self.last_world_position = self.key_world_position;
            }
            PathHit::Tangent { time, dir } => {
                if !Self::path_editable(manager, path_index) {
                    return true;
                }

                self.mode = Mode::TangentEdit;
                self.selected_tangent = dir;
                self.last_selected_time = time;

                if let Some(key) = manager.path(path_index).and_then(|p| p.keyframe(time)) {
                    self.tangent_world_position = match dir {
                        TangentDir::In => key.in_tangent_world_from_curve,
                        TangentDir::Out => key.out_tangent_world_from_curve,
                    };
                    self.key_world_position = key.world_position;
                }
                self.last_world_position = self.tangent_world_position;
            }
            // A frame hit only selects the path.
            PathHit::Frame { .. } => {}
        }

        true
    }

    fn press_draw(
        &mut self,
        cursor: DVec2,
        button: MouseButton,
        modifiers: Modifiers,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) -> bool {
        if button == MouseButton::Middle {
            return self.press_click_add(cursor, manager, ctx, rec);
        }

        let Some((path_index, hit)) = self.hit_any_path(cursor, manager, ctx) else {
            self.mode = Mode::Marquee;
            self.selection_mode = SelectionMode::from_modifiers(modifiers);
            return false;
        };

        self.selected_path = Some(path_index);
        if let Some(path) = manager.path_mut(path_index) {
            path.set_selected_from_tool(true);
        }

        let PathHit::Keyframe { time } = hit else {
            return false;
        };
        if !Self::path_editable(manager, path_index) {
            return false;
        }

        self.selected_time = time;
        let Some(path) = manager.path_mut(path_index) else {
            return false;
        };
        self.key_world_position = path.key_world_position(time).unwrap_or_default();
        path.select_key_at_time(time);

        rec.start_anim_edits();
        self.started_recording = true;

        if modifiers.contains(Modifiers::CTRL) {
            self.mode = Mode::Stroke;
            self.stroke_points.clear();
            self.stroke_points.push(self.initial);
        } else {
            self.mode = Mode::Draw;
            path.set_is_drawing(true);
            path.set_end_drawing_time(time);
            self.max_time = ctx.timeline_max;
            self.stepped_time = time;
            path.delete_keys_after_time(time, rec);

            let mut position = self.key_world_position;
            if Self::camera_space(ctx) {
                position = self.camera_space_to_world(manager, ctx, position, time);
            }
            if let Some(path) = manager.path_mut(path_index) {
                path.add_key_at_time(time, Some(position), true, ctx.settings, rec);
            }
            self.last_step = Instant::now();
        }

        true
    }

    /// Middle-press: key the first path at the current time, at a depth
    /// taken from the nearest existing key.
    fn press_click_add(
        &mut self,
        cursor: DVec2,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) -> bool {
        if manager.path(0).is_none() || !Self::path_editable(manager, 0) {
            return false;
        }

        self.selected_path = Some(0);
        self.mode = Mode::ClickAddWorld;
        self.selected_time = ctx.now;

        let Some(path) = manager.path_mut(0) else {
            return false;
        };
        path.set_selected_from_tool(true);

        let (before, after) = path.boundaries_for_time(self.selected_time);
        let key_time = before.or(after).unwrap_or(self.selected_time);
        self.key_world_position = path.world_position_at(key_time, ctx.settings);
        self.initial = ctx.viewport.world_to_screen(self.key_world_position);

        let mut new_position = world_position_from_proj_point(
            ctx.viewport,
            self.key_world_position,
            self.initial,
            cursor,
            self.camera_position,
        );
        if Self::camera_space(ctx) {
            new_position =
                self.camera_space_to_world(manager, ctx, new_position, self.selected_time);
        }

        rec.start_anim_edits();
        self.started_recording = true;

        if let Some(path) = manager.path_mut(0) {
            path.add_key_at_time(self.selected_time, Some(new_position), true, ctx.settings, rec);
        }
        true
    }

    // ===== Drag =====

    pub fn drag(
        &mut self,
        cursor: DVec2,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) -> bool {
        self.marquee_end = cursor;
        match self.tool {
            ToolKind::Edit => self.drag_edit(cursor, manager, ctx, rec),
            ToolKind::Draw => self.drag_draw(cursor, manager, ctx, rec),
        }
    }

    fn drag_edit(
        &mut self,
        cursor: DVec2,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) -> bool {
        // Open the undo transaction on the first drag, not the press, so a
        // click without movement leaves no empty undo entry.
        if !self.started_recording
            && matches!(self.mode, Mode::FrameEdit | Mode::TangentEdit)
        {
            rec.start_anim_edits();
            self.started_recording = true;
        }

        match self.mode {
            Mode::FrameEdit => {
                let mut new_position = world_position_from_proj_point(
                    ctx.viewport,
                    self.key_world_position,
                    self.initial,
                    cursor,
                    self.camera_position,
                );

                if self.along_preferred_axis {
                    if self.pref_edit_axis == 0 {
                        new_position.y = self.key_world_position.y;
                    } else {
                        new_position.x = self.key_world_position.x;
                        new_position.z = self.key_world_position.z;
                    }
                }

                let mut offset = new_position - self.last_world_position;
                let camera_space = Self::camera_space(ctx);
                if camera_space {
                    offset = self.inverse_camera_matrix.transform_vector3(offset);
                }

                let (paths, cam_cache) = manager.split_paths_and_camera();
                for path in paths.iter_mut() {
                    if path.is_constrained() || path.object().has_animation_layers() {
                        continue;
                    }
                    for time in path.selected_key_times() {
                        let key_offset = match (camera_space, ctx.camera) {
                            (true, Some(source)) => {
                                let world_at_time =
                                    cam_cache.ensure_at(source, time, false).inverse();
                                world_at_time.transform_vector3(offset)
                            }
                            _ => offset,
                        };
                        path.offset_world_position(key_offset, time, ctx.settings, rec);
                    }
                }

                self.last_world_position = new_position;
                true
            }
            Mode::TangentEdit => {
                let new_position = world_position_from_proj_point(
                    ctx.viewport,
                    self.tangent_world_position,
                    self.initial,
                    cursor,
                    self.camera_position,
                );

                let to_world = if Self::camera_space(ctx) {
                    match ctx.camera {
                        Some(source) => {
                            let world_at_time = manager
                                .camera_cache_mut()
                                .ensure_at(source, self.last_selected_time, false)
                                .inverse();
                            world_at_time * self.inverse_camera_matrix
                        }
                        None => DMat4::IDENTITY,
                    }
                } else {
                    DMat4::IDENTITY
                };

                if let Some(path) = self.selected_path.and_then(|i| manager.path_mut(i)) {
                    path.set_tangent_world_position(
                        new_position,
                        self.last_selected_time,
                        self.selected_tangent,
                        to_world,
                        ctx.settings,
                        rec,
                    );
                }
                true
            }
            Mode::Marquee => true,
            _ => false,
        }
    }

    fn drag_draw(
        &mut self,
        cursor: DVec2,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) -> bool {
        let Some(path_index) = self.selected_path else {
            return self.mode == Mode::Marquee;
        };

        match self.mode {
            Mode::ClickAddWorld => {
                let mut new_position = world_position_from_proj_point(
                    ctx.viewport,
                    self.key_world_position,
                    self.initial,
                    cursor,
                    self.camera_position,
                );
                if Self::camera_space(ctx) {
                    new_position =
                        self.camera_space_to_world(manager, ctx, new_position, self.selected_time);
                }
                if let Some(path) = manager.path_mut(path_index) {
                    path.set_frame_world_position(
                        new_position,
                        self.selected_time,
                        ctx.settings,
                        rec,
                    );
                }
                true
            }
            Mode::Draw => {
                if self.last_step.elapsed().as_secs_f64() <= ctx.settings.draw_time_interval {
                    return true;
                }

                self.stepped_time += ctx.settings.draw_frame_interval;
                if self.stepped_time > self.max_time {
                    warn!("drawing outside of the timeline range, showing key frames only");
                }

                let mut new_position = world_position_from_proj_point(
                    ctx.viewport,
                    self.key_world_position,
                    self.initial,
                    cursor,
                    self.camera_position,
                );
                if Self::camera_space(ctx) {
                    new_position =
                        self.camera_space_to_world(manager, ctx, new_position, self.stepped_time);
                }

                if let Some(path) = manager.path_mut(path_index) {
                    path.add_key_at_time(
                        self.stepped_time,
                        Some(new_position),
                        true,
                        ctx.settings,
                        rec,
                    );
                    path.set_end_drawing_time(self.stepped_time);
                }
                self.last_step = Instant::now();
                true
            }
            Mode::Stroke => {
                if let Some(&last) = self.stroke_points.last() {
                    if (cursor - last).length() > STROKE_POINT_SPACING {
                        self.stroke_points.push(cursor);
                    }
                }
                true
            }
            _ => false,
        }
    }

    // ===== Release =====

    pub fn release(
        &mut self,
        cursor: DVec2,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) -> SessionOutcome {
        self.marquee_end = cursor;
        match self.tool {
            ToolKind::Edit => self.release_edit(manager, rec),
            ToolKind::Draw => self.release_draw(manager, ctx, rec),
        }
    }

    fn marquee_outcome(&mut self) -> SessionOutcome {
        let outcome = if self.mode == Mode::Marquee {
            SessionOutcome::Marquee {
                rect: Marquee::from_corners(self.initial, self.marquee_end),
                mode: self.selection_mode,
            }
        } else {
            SessionOutcome::None
        };
        self.clear_gesture();
        outcome
    }

    fn release_edit(
        &mut self,
        manager: &mut PathManager,
        rec: &mut dyn UndoRecorder,
    ) -> SessionOutcome {
        let Some(path_index) = self.selected_path else {
            return self.marquee_outcome();
        };

        if self.started_recording && matches!(self.mode, Mode::FrameEdit | Mode::TangentEdit) {
            rec.commit();
        }
        if let Some(path) = manager.path_mut(path_index) {
            path.set_selected_from_tool(false);
        }
        self.clear_gesture();
        SessionOutcome::None
    }

    fn release_draw(
        &mut self,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) -> SessionOutcome {
        let Some(path_index) = self.selected_path else {
            return self.marquee_outcome();
        };

        if self.mode == Mode::Stroke {
            self.apply_stroke(path_index, manager, ctx, rec);
        }

        if self.mode != Mode::None && self.started_recording {
            rec.commit();
        }

        if let Some(path) = manager.path_mut(path_index) {
            path.deselect_all_keys();
            path.set_selected_from_tool(false);
            path.set_is_drawing(false);
        }

        self.clear_gesture();
        SessionOutcome::None
    }

    // ===== Stroke matching =====

    /// Re-places the run of keys reaching along the stroke onto the stroke
    /// polyline.
    fn apply_stroke(
        &mut self,
        path_index: usize,
        manager: &mut PathManager,
        ctx: &SessionContext<'_>,
        rec: &mut dyn UndoRecorder,
    ) {
        let stroke_num = self.stroke_points.len().saturating_sub(1);
        if stroke_num <= 1 {
            return;
        }

        // Mean direction of the stroke, seen from its start.
        let mut directional = DVec2::ZERO;
        for point in self.stroke_points.iter().skip(1) {
            directional += *point - self.stroke_points[0];
        }
        directional = (directional / stroke_num as f64).normalize_or_zero();

        let camera_space = Self::camera_space(ctx);
        let (paths, cam_cache) = manager.split_paths_and_camera();
        let Some(path) = paths.get_mut(path_index) else {
            return;
        };

        let keys = path.key_times();
        let Some(selected_index) = keys.iter().position(|&t| t == self.selected_time) else {
            return;
        };

        let keys_screen: Vec<DVec2> = keys
            .iter()
            .map(|&t| {
                ctx.viewport
                    .world_to_screen(path.key_world_position(t).unwrap_or_default())
            })
            .collect();

        let direction = stroke::stroke_direction(directional, &keys_screen, selected_index);
        if direction == 0 {
            return;
        }

        // Walk outward from the grabbed key while the screen distance to the
        // stroke end keeps shrinking; a few growing steps are forgiven so a
        // wiggly path does not cut the run short.
        struct Capture {
            time: f64,
            screen: DVec2,
            world: DVec3,
        }

        let mut captured: Vec<Capture> = Vec::new();
        let mut pending: Vec<Capture> = Vec::new();
        let mut skipped = 0;

        let last_stroke_pos = self.stroke_points[stroke_num];
        let mut distance = (last_stroke_pos - keys_screen[selected_index]).length();

        let mut i = selected_index as i64 + i64::from(direction);
        while i >= 0 && (i as usize) < keys.len() {
            let iu = i as usize;
            let screen = keys_screen[iu];
            let this_distance = (last_stroke_pos - screen).length();
            let capture = Capture {
                time: keys[iu],
                screen,
                world: path.key_world_position(keys[iu]).unwrap_or_default(),
            };

            if this_distance > distance {
                skipped += 1;
                if skipped > MAX_SKIPPED || iu == 0 || iu == keys.len() - 1 {
                    break;
                }
                pending.push(capture);
                i += i64::from(direction);
                continue;
            }

            skipped = 0;
            if !pending.is_empty() {
                captured.append(&mut pending);
            }
            distance = this_distance;
            captured.push(capture);

            if iu == 0 || iu == keys.len() - 1 {
                break;
            }
            i += i64::from(direction);
        }

        if captured.is_empty() {
            return;
        }

        // Delete first so the tangents recompute when the keys come back.
        for capture in captured.iter().rev() {
            path.delete_key_at_time(capture.time, false, rec);
        }

        let (lengths, stroke_length) = stroke::segment_lengths(&self.stroke_points);
        let point_count = captured.len();

        for (i, capture) in captured.iter().enumerate() {
            let target = match ctx.settings.stroke_mode {
                StrokeMode::Closest => {
                    stroke::closest_point_on_polyline(&self.stroke_points, capture.screen)
                }
                StrokeMode::Spread => stroke::spread_point_on_polyline(
                    &self.stroke_points,
                    i,
                    point_count,
                    stroke_length,
                    &lengths,
                ),
            };

            let mut new_position = world_position_from_proj_point(
                ctx.viewport,
                capture.world,
                capture.screen,
                target,
                self.camera_position,
            );

            if camera_space {
                if let Some(source) = ctx.camera {
                    let world_at_time = cam_cache.ensure_at(source, capture.time, false).inverse();
                    new_position = world_at_time
                        .transform_point3(self.inverse_camera_matrix.transform_point3(new_position));
                }
            }

            path.add_key_at_time(capture.time, Some(new_position), false, ctx.settings, rec);
        }
    }
}

/// Click selection of keys: ctrl toggles, shift extends, a plain click
/// replaces the selection across all paths unless the key was already
/// selected.
fn modify_selection(
    manager: &mut PathManager,
    path_index: usize,
    times: &[f64],
    ctrl: bool,
    shift: bool,
) {
    manager.store_previous_key_selection();

    for (i, &time) in times.iter().enumerate() {
        let this_shift = i != 0 || shift;

        if ctrl {
            let Some(path) = manager.path_mut(path_index) else {
                return;
            };
            if path.is_key_at_time_selected(time) {
                path.deselect_key_at_time(time);
            } else {
                path.select_key_at_time(time);
            }
        } else if this_shift {
            if let Some(path) = manager.path_mut(path_index) {
                path.select_key_at_time(time);
            }
        } else {
            if manager
                .path(path_index)
                .is_some_and(|p| p.is_key_at_time_selected(time))
            {
                return;
            }
            manager.deselect_all_keys();
            if let Some(path) = manager.path_mut(path_index) {
                path.select_key_at_time(time);
            }
        }
    }
}
