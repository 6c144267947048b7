use iced::{
    mouse, time,
    widget::{
        button,
        canvas::{self, Canvas, Frame as CanvasFrame, Geometry, Path, Stroke},
        column, row, scrollable, text, text_input, Column, Container,
    },
    Alignment, Color, Element, Length, Point, Rectangle, Renderer, Subscription, Task, Theme,
};
use liftcore::model::FlowConditions;
use liftcore::pipeline::{
    AcquisitionState, Color as FrameColor, DisplayMode, DisplayOptions, Frame, SplineOverlay,
    TapPoint,
};
use serde::Serialize;
use std::time::Duration;

const BRIDGE: &str = "http://127.0.0.1:9000";

fn main() -> iced::Result {
    iced::application(Visualizer::boot, Visualizer::update, Visualizer::view)
        .title(application_title)
        .subscription(application_subscription)
        .theme(application_theme)
        .run()
}

fn application_title(state: &Visualizer) -> String {
    match &state.frame {
        Some(frame) if frame.demo => format!("Wing Pressure Station - {} (DEMO)", frame.profile_name),
        Some(frame) => format!("Wing Pressure Station - {}", frame.profile_name),
        None => "Wing Pressure Station".into(),
    }
}

fn application_subscription(_: &Visualizer) -> Subscription<Message> {
    time::every(Duration::from_millis(100)).map(|_| Message::Tick)
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Light
}

#[derive(Debug)]
struct Visualizer {
    frame: Option<Frame>,
    options: DisplayOptions,
    flow: FlowForm,
    save_samples: String,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    FrameFetched(Result<Frame, String>),
    SetMode(DisplayMode),
    ToggleSpline,
    FlowFieldChanged(FlowField, String),
    SubmitFlow,
    SaveSamplesChanged(String),
    Setup,
    Start,
    Stop,
    Save,
    Posted(&'static str, Result<String, String>),
}

#[derive(Debug, Clone, Copy)]
enum FlowField {
    Angle,
    Velocity,
    Width,
}

impl Visualizer {
    fn boot() -> (Self, Task<Message>) {
        (
            Visualizer {
                frame: None,
                options: DisplayOptions::default(),
                flow: FlowForm::from(FlowConditions::default()),
                save_samples: "20".into(),
                status: "Waiting for the station...".into(),
                history: Vec::new(),
            },
            Task::perform(fetch_frame(), Message::FrameFetched),
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => Task::perform(fetch_frame(), Message::FrameFetched),
            Message::FrameFetched(Ok(frame)) => {
                if state.frame.is_none() {
                    state.flow = FlowForm::from(frame.flow);
                }
                if let Some(notice) = &frame.notice {
                    let known = state.history.last() == Some(&notice.text);
                    if !known {
                        state.push_history(notice.text.clone());
                    }
                }
                state.status = describe(&frame);
                state.frame = Some(frame);
                Task::none()
            }
            Message::FrameFetched(Err(err)) => {
                state.status = format!("Station unreachable: {err}");
                Task::none()
            }
            Message::SetMode(mode) => {
                state.options.mode = mode;
                Task::perform(post("display", state.options), |result| {
                    Message::Posted("display", result)
                })
            }
            Message::ToggleSpline => {
                state.options.show_spline = !state.options.show_spline;
                Task::perform(post("display", state.options), |result| {
                    Message::Posted("display", result)
                })
            }
            Message::FlowFieldChanged(field, value) => {
                state.flow.update_field(field, value);
                Task::none()
            }
            Message::SubmitFlow => match state.flow.to_conditions() {
                Ok(flow) => Task::perform(post("flow", flow), |result| {
                    Message::Posted("flow", result)
                }),
                Err(err) => {
                    state.status = err;
                    Task::none()
                }
            },
            Message::SaveSamplesChanged(value) => {
                state.save_samples = value;
                Task::none()
            }
            Message::Setup => Task::perform(post("setup", Empty {}), |result| {
                Message::Posted("setup", result)
            }),
            Message::Start => Task::perform(post("start", Empty {}), |result| {
                Message::Posted("start", result)
            }),
            Message::Stop => Task::perform(post("stop", Empty {}), |result| {
                Message::Posted("stop", result)
            }),
            Message::Save => {
                let samples = state.save_samples.trim().parse::<usize>().ok();
                Task::perform(post("save", SaveBody { samples }), |result| {
                    Message::Posted("save", result)
                })
            }
            Message::Posted(action, Ok(_)) => {
                state.push_history(format!("{action} accepted"));
                Task::none()
            }
            Message::Posted(action, Err(err)) => {
                state.status = format!("{action} failed: {err}");
                state.push_history(state.status.clone());
                Task::none()
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let mode_button = |label: &'static str, mode: DisplayMode| {
            let label = if state.options.mode == mode {
                format!("[{label}]")
            } else {
                label.to_string()
            };
            button(text(label)).on_press(Message::SetMode(mode)).padding(8)
        };
        let spline_label = if state.options.show_spline {
            "Hide spline"
        } else {
            "Show spline"
        };

        let acquisition = state.frame.as_ref().map(|frame| &frame.acquisition);
        let gate = ControlGate::for_state(acquisition);

        let controls = column![
            text("Acquisition").size(24),
            row![
                button("Setup").on_press(Message::Setup).padding(8),
                button("Start")
                    .on_press_maybe(gate.start.then_some(Message::Start))
                    .padding(8),
                button("Stop")
                    .on_press_maybe(gate.stop.then_some(Message::Stop))
                    .padding(8),
            ]
            .spacing(8),
            row![
                text_input("Measurements", &state.save_samples)
                    .on_input(Message::SaveSamplesChanged)
                    .padding(6)
                    .width(Length::Fixed(120.0)),
                button("Save mean")
                    .on_press_maybe(gate.save.then_some(Message::Save))
                    .padding(8),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
            text("Display").size(24),
            row![
                mode_button("Pressure", DisplayMode::PressureView),
                mode_button("Cp", DisplayMode::CoefficientView),
                mode_button("Pause", DisplayMode::Paused),
            ]
            .spacing(8),
            button(spline_label).on_press(Message::ToggleSpline).padding(8),
            text("Flow").size(24),
            text_input("Angle of attack (deg)", &state.flow.angle)
                .on_input(|value| Message::FlowFieldChanged(FlowField::Angle, value))
                .padding(6),
            text_input("Velocity (m/s)", &state.flow.velocity)
                .on_input(|value| Message::FlowFieldChanged(FlowField::Velocity, value))
                .padding(6),
            text_input("Width (m)", &state.flow.width)
                .on_input(|value| Message::FlowFieldChanged(FlowField::Width, value))
                .padding(6),
            button("Apply flow").on_press(Message::SubmitFlow).padding(8),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(340.0));

        let readout = match &state.frame {
            Some(frame) => {
                let environment = frame
                    .environment
                    .map(|env| {
                        format!(
                            "T {:.2} C | p {:.0} Pa | RH {:.1} % | rho {:.3} kg/m3",
                            env.temperature, env.ambient_pressure, env.humidity, env.density
                        )
                    })
                    .unwrap_or_else(|| "no reading yet".into());
                column![
                    text(format!("Lift: {}", frame.lift_label)).size(28),
                    text(environment).size(14),
                    text(format!(
                        "alpha {} deg | v {} m/s | width {} m",
                        frame.flow.angle_of_attack_deg, frame.flow.velocity, frame.flow.width
                    ))
                    .size(14),
                ]
                .spacing(4)
            }
            None => column![text("Lift: -").size(28)],
        };

        let notice = state
            .frame
            .as_ref()
            .and_then(|frame| {
                frame.notice.as_ref().map(|notice| {
                    text(notice.text.clone())
                        .size(14)
                        .color(to_iced(frame.notice_color))
                })
            })
            .unwrap_or_else(|| text(""));

        let warning = state
            .frame
            .as_ref()
            .and_then(|frame| frame.warning.clone())
            .map(|warning| text(warning).size(14).color(Color::from_rgb(0.8, 0.4, 0.0)))
            .unwrap_or_else(|| text(""));

        let plot = Canvas::new(PressurePlot {
            frame: state.frame.clone(),
        })
        .width(Length::Fill)
        .height(Length::Fixed(420.0));

        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.clone()).size(12))
                })
        };

        let telemetry = column![
            readout,
            plot,
            notice,
            warning,
            text(&state.status).size(12),
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fixed(90.0))).padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fill);

        let layout = row![controls, telemetry]
            .spacing(20)
            .align_y(Alignment::Start)
            .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > 20 {
            self.history.remove(0);
        }
    }
}

/// Which acquisition buttons are pressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ControlGate {
    start: bool,
    stop: bool,
    save: bool,
}

impl ControlGate {
    /// A faulted acquisition only accepts a new setup.
    fn for_state(state: Option<&AcquisitionState>) -> Self {
        let faulted = matches!(state, Some(AcquisitionState::Faulted { .. }));
        let active = state.is_some_and(AcquisitionState::is_active);
        Self {
            start: !faulted && !active,
            stop: active,
            save: active,
        }
    }
}

fn describe(frame: &Frame) -> String {
    let state = match &frame.acquisition {
        AcquisitionState::Idle => "idle".to_string(),
        AcquisitionState::Running => "running".to_string(),
        AcquisitionState::BatchAveraging { target, collected } => {
            format!("averaging {collected}/{target}")
        }
        AcquisitionState::Faulted { reason } => format!("faulted: {reason}"),
    };
    format!(
        "frame {} | acquisition {} | calculations {} ok / {} skipped",
        frame.frame, state, frame.calculation.processed, frame.calculation.errors
    )
}

fn to_iced(color: FrameColor) -> Color {
    Color::from_rgb8(color.r, color.g, color.b)
}

async fn fetch_frame() -> Result<Frame, String> {
    let response = reqwest::get(format!("{BRIDGE}/frame"))
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("{}", response.status()));
    }
    response.json::<Frame>().await.map_err(|e| e.to_string())
}

async fn post<T: Serialize>(route: &'static str, body: T) -> Result<String, String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{BRIDGE}/{route}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(text)
    } else {
        Err(format!("{status}: {text}"))
    }
}

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Serialize)]
struct SaveBody {
    samples: Option<usize>,
}

#[derive(Debug, Clone)]
struct FlowForm {
    angle: String,
    velocity: String,
    width: String,
}

impl From<FlowConditions> for FlowForm {
    fn from(flow: FlowConditions) -> Self {
        Self {
            angle: flow.angle_of_attack_deg.to_string(),
            velocity: flow.velocity.to_string(),
            width: flow.width.to_string(),
        }
    }
}

impl FlowForm {
    fn update_field(&mut self, field: FlowField, value: String) {
        match field {
            FlowField::Angle => self.angle = value,
            FlowField::Velocity => self.velocity = value,
            FlowField::Width => self.width = value,
        }
    }

    fn to_conditions(&self) -> Result<FlowConditions, String> {
        let parse = |name: &str, value: &str| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("{name} must be a number"))
        };
        Ok(FlowConditions {
            angle_of_attack_deg: parse("angle", &self.angle)?,
            velocity: parse("velocity", &self.velocity)?,
            width: parse("width", &self.width)?,
        })
    }
}

/// Taps, splines and wing outline on a shared chordwise axis. Negative
/// pressure is drawn upwards.
#[derive(Clone)]
struct PressurePlot {
    frame: Option<Frame>,
}

const TOP_COLOR: Color = Color::from_rgb(0.1, 0.45, 0.85);
const BOTTOM_COLOR: Color = Color::from_rgb(0.85, 0.2, 0.55);
const WING_COLOR: Color = Color::from_rgb(0.3, 0.3, 0.3);

struct PlotArea {
    bounds: Rectangle,
    low: f64,
    high: f64,
}

impl PlotArea {
    const MARGIN: f32 = 24.0;

    fn point(&self, x: f64, value: f64) -> Point {
        let width = self.bounds.width - 2.0 * Self::MARGIN;
        let height = self.bounds.height - 2.0 * Self::MARGIN;
        let fraction = ((value - self.low) / (self.high - self.low)) as f32;
        Point::new(
            Self::MARGIN + x as f32 * width,
            Self::MARGIN + fraction * height,
        )
    }
}

fn value_range(frame: &Frame) -> (f64, f64) {
    let taps = frame.top.iter().chain(&frame.bottom).map(|tap| tap.value);
    let overlay = frame.overlay.iter().flat_map(|overlay: &SplineOverlay| {
        overlay
            .spline_top
            .iter()
            .chain(&overlay.spline_bottom)
            .copied()
            .chain(overlay.wing_top.iter().chain(&overlay.wing_bottom).map(|p| p.1))
    });
    let (low, high) = taps
        .chain(overlay)
        .filter(|value| value.is_finite())
        .fold((0.0f64, 0.0f64), |(low, high), value| {
            (low.min(value), high.max(value))
        });
    if high - low < 1e-9 {
        (low - 1.0, high + 1.0)
    } else {
        let pad = 0.05 * (high - low);
        (low - pad, high + pad)
    }
}

fn polyline(area: &PlotArea, points: impl Iterator<Item = (f64, f64)>) -> Path {
    Path::new(|builder| {
        for (i, (x, value)) in points.enumerate() {
            let point = area.point(x, value);
            if i == 0 {
                builder.move_to(point);
            } else {
                builder.line_to(point);
            }
        }
    })
}

fn draw_taps(frame: &mut CanvasFrame, area: &PlotArea, taps: &[TapPoint], color: Color) {
    for tap in taps {
        let marker = Path::new(|builder| builder.circle(area.point(tap.x, tap.value), 4.0));
        frame.fill(&marker, color);
    }
}

impl canvas::Program<Message> for PressurePlot {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut canvas_frame = CanvasFrame::new(renderer, bounds.size());
        canvas_frame.fill_rectangle(Point::ORIGIN, bounds.size(), Color::WHITE);

        let Some(frame) = &self.frame else {
            return vec![canvas_frame.into_geometry()];
        };
        let (low, high) = value_range(frame);
        let area = PlotArea { bounds, low, high };

        let baseline = polyline(&area, [(0.0, 0.0), (1.0, 0.0)].into_iter());
        canvas_frame.stroke(
            &baseline,
            Stroke::default()
                .with_width(1.0)
                .with_color(Color::from_rgb(0.75, 0.75, 0.75)),
        );

        if let Some(overlay) = &frame.overlay {
            let grid = overlay.grid.iter().copied();
            for (values, color) in [
                (&overlay.spline_top, TOP_COLOR),
                (&overlay.spline_bottom, BOTTOM_COLOR),
            ] {
                let path = polyline(&area, grid.clone().zip(values.iter().copied()));
                canvas_frame.stroke(&path, Stroke::default().with_width(2.0).with_color(color));
            }
            for wing in [&overlay.wing_top, &overlay.wing_bottom] {
                let path = polyline(&area, wing.iter().copied());
                canvas_frame.stroke(
                    &path,
                    Stroke::default().with_width(1.5).with_color(WING_COLOR),
                );
            }
        }

        draw_taps(&mut canvas_frame, &area, &frame.top, TOP_COLOR);
        draw_taps(&mut canvas_frame, &area, &frame.bottom, BOTTOM_COLOR);

        vec![canvas_frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faulted_acquisition_only_allows_setup() {
        let faulted = AcquisitionState::Faulted {
            reason: "scanner unplugged".into(),
        };
        assert_eq!(
            ControlGate::for_state(Some(&faulted)),
            ControlGate {
                start: false,
                stop: false,
                save: false,
            }
        );
    }

    #[test]
    fn running_acquisition_allows_stop_and_save() {
        let gate = ControlGate::for_state(Some(&AcquisitionState::Running));
        assert!(!gate.start);
        assert!(gate.stop && gate.save);

        let averaging = AcquisitionState::BatchAveraging {
            target: 5,
            collected: 2,
        };
        assert_eq!(ControlGate::for_state(Some(&averaging)), gate);
    }

    #[test]
    fn idle_or_unknown_acquisition_allows_start() {
        for state in [None, Some(&AcquisitionState::Idle)] {
            let gate = ControlGate::for_state(state);
            assert!(gate.start);
            assert!(!gate.save);
        }
    }
}
