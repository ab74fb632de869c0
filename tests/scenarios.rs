//! End-to-end runs of the built-in exercises over synthetic frame streams.

use approx::assert_abs_diff_eq;
use posecoach::conditions::{ConditionEvaluator, ConditionKind, Thresholds, Verdict};
use posecoach::config::builtin;
use posecoach::geometry::angle;
use posecoach::pose::standing_pose;
use posecoach::{BodyPart, FrameOutcome, Landmark, PoseFrame, PoseSample, Session};

fn feed(session: &mut Session, sample: &PoseSample, from: u64, to: u64) -> Vec<FrameOutcome> {
    (from..=to)
        .step_by(100)
        .map(|t| {
            session
                .process_frame(&PoseFrame::new(t, sample.clone()))
                .expect("frame")
        })
        .collect()
}

/// Right foot 0.3 above the left, both arms straight up.
fn one_leg_arms_up() -> PoseSample {
    use BodyPart::*;
    standing_pose()
        .with(LeftElbow, Landmark::at(0.43, 0.20))
        .with(LeftWrist, Landmark::at(0.41, 0.10))
        .with(RightElbow, Landmark::at(0.57, 0.20))
        .with(RightWrist, Landmark::at(0.59, 0.10))
        .with(LeftAnkle, Landmark::at(0.46, 0.8))
        .with(RightKnee, Landmark::at(0.54, 0.62))
        .with(RightAnkle, Landmark::at(0.54, 0.5))
}

#[test]
fn raised_foot_and_arms_advance_after_the_dwell() {
    let pose = one_leg_arms_up();
    let eval = ConditionEvaluator::new(Thresholds::default());
    assert_eq!(eval.check(ConditionKind::OneFootRaised, &pose), Verdict::Met);
    assert_eq!(eval.check(ConditionKind::BothArmsRaised, &pose), Verdict::Met);

    let mut session = Session::new(builtin("balance").unwrap()).unwrap();
    let before = feed(&mut session, &pose, 0, 4900);
    assert!(before.iter().all(|o| o.phase == "balance" && o.transition.is_none()));
    assert_eq!(before.last().unwrap().remaining_secs, Some(1));

    let done = session
        .process_frame(&PoseFrame::new(5000, pose.clone()))
        .unwrap();
    assert_eq!(done.phase, "complete");
    assert!(done.transition.is_some());
    assert!(done.result.is_some());
}

#[test]
fn perfectly_still_hold_gets_the_top_stability_bucket() {
    let pose = one_leg_arms_up();
    let mut session = Session::new(builtin("balance").unwrap()).unwrap();
    let out = feed(&mut session, &pose, 0, 5000);
    let result = out.last().unwrap().result.clone().unwrap();

    assert_eq!(result.max_displacement, Some(0.0));
    assert_eq!(result.component_scores["trunk"], 100.0);
    assert_eq!(
        result.feedback["trunk"],
        "Perfect stability! You remained incredibly steady."
    );
    assert_eq!(result.component_scores["arm"], 100.0);
    assert_eq!(result.feedback["arm"], "Excellent arm position!");
    assert_eq!(result.total_score, 100.0);
}

#[test]
fn straight_knees_never_finish_preparation() {
    use BodyPart::*;
    // Knees pushed out just enough for a 170 degree angle.
    let pose = standing_pose()
        .with(LeftKnee, Landmark::at(0.473, 0.70))
        .with(RightKnee, Landmark::at(0.553, 0.70));
    let knee = angle(pose.get(LeftHip), pose.get(LeftKnee), pose.get(LeftAnkle));
    assert_abs_diff_eq!(knee, 170.0, epsilon = 0.5);

    let mut session = Session::new(builtin("jump").unwrap()).unwrap();
    let out = feed(&mut session, &pose, 0, 10_000);
    assert!(out.iter().all(|o| o.phase == "preparation"));
    assert!(out.iter().all(|o| o.instruction == "Bend your knees slightly."));
    assert_eq!(session.state().dwell_started_at, None);
}

fn crouch(ankle_y: f32) -> PoseSample {
    crouch_with(ankle_y, ankle_y)
}

fn crouch_with(left_ankle_y: f32, right_ankle_y: f32) -> PoseSample {
    use BodyPart::*;
    standing_pose()
        .with(LeftKnee, Landmark::at(0.52, 0.70))
        .with(RightKnee, Landmark::at(0.66, 0.70))
        .with(LeftAnkle, Landmark::at(0.40, left_ankle_y))
        .with(RightAnkle, Landmark::at(0.60, right_ankle_y))
}

/// Legs straight, feet apart, both arms swung above the shoulders.
fn arm_swing() -> PoseSample {
    use BodyPart::*;
    standing_pose()
        .with(LeftKnee, Landmark::at(0.43, 0.70))
        .with(RightKnee, Landmark::at(0.57, 0.70))
        .with(LeftAnkle, Landmark::at(0.40, 0.85))
        .with(RightAnkle, Landmark::at(0.60, 0.85))
        .with(LeftElbow, Landmark::at(0.43, 0.20))
        .with(LeftWrist, Landmark::at(0.41, 0.10))
        .with(RightElbow, Landmark::at(0.57, 0.20))
        .with(RightWrist, Landmark::at(0.59, 0.10))
}

/// Runs preparation and propulsion; the session is left waiting in takeoff.
fn ready_to_jump(session: &mut Session) {
    let prep = feed(session, &crouch(0.85), 0, 3000);
    assert_eq!(prep.last().unwrap().phase, "propulsion");
    let swung = session.process_frame(&PoseFrame::new(3100, arm_swing())).unwrap();
    assert_eq!(swung.phase, "takeoff");
}

#[test]
fn propulsion_needs_straight_legs_then_raised_arms() {
    use BodyPart::*;
    let eval = ConditionEvaluator::new(builtin("jump").unwrap().thresholds);
    assert_eq!(eval.check(ConditionKind::LegsStraight, &arm_swing()), Verdict::Met);
    assert_eq!(eval.check(ConditionKind::BothArmsRaised, &arm_swing()), Verdict::Met);

    let mut session = Session::new(builtin("jump").unwrap()).unwrap();
    let prep = feed(&mut session, &crouch(0.85), 0, 3000);
    let ready = prep.last().unwrap();
    assert_eq!(ready.phase, "propulsion");
    assert_eq!(
        ready.instruction,
        "Straighten your legs and swing your arms forward and upward."
    );

    // Still crouched: the legs come first.
    let bent = session.process_frame(&PoseFrame::new(3100, crouch(0.85))).unwrap();
    assert_eq!(bent.instruction, "Straighten your legs more.");

    let arms_down = arm_swing()
        .with(LeftWrist, Landmark::at(0.44, 0.52))
        .with(RightWrist, Landmark::at(0.56, 0.52));
    let low = session.process_frame(&PoseFrame::new(3200, arms_down)).unwrap();
    assert_eq!(low.phase, "propulsion");
    assert_eq!(low.instruction, "Raise both arms above your shoulders.");

    let swung = session.process_frame(&PoseFrame::new(3300, arm_swing())).unwrap();
    assert_eq!(swung.phase, "takeoff");
    assert_eq!(swung.instruction, "Jump!");
}

#[test]
fn jump_is_measured_from_takeoff_to_landing() {
    let mut session = Session::new(builtin("jump").unwrap()).unwrap();
    let prep = feed(&mut session, &crouch(0.85), 0, 3000);
    assert_eq!(prep[0].instruction, "Good position! Jump in 3 seconds...");
    let swung = session.process_frame(&PoseFrame::new(3100, arm_swing())).unwrap();
    assert_eq!(swung.phase, "takeoff");
    assert_eq!(swung.instruction, "Jump!");

    let up = session.process_frame(&PoseFrame::new(3200, crouch(0.78))).unwrap();
    assert_eq!(up.phase, "flight");
    session.process_frame(&PoseFrame::new(3300, crouch(0.72))).unwrap();
    let falling = session.process_frame(&PoseFrame::new(3400, crouch(0.80))).unwrap();
    assert_eq!(falling.phase, "flight");

    let landed = session.process_frame(&PoseFrame::new(3500, crouch(0.86))).unwrap();
    assert_eq!(landed.phase, "landed");
    let result = landed.result.unwrap();
    assert_eq!(result.component_scores["height"], 100.0);
    assert_eq!(result.component_scores["landing"], 100.0);
    assert_eq!(
        result.summary.as_deref(),
        Some("Excellent jump! Great height and landing!")
    );
}

#[test]
fn lifting_one_foot_is_not_a_takeoff() {
    let mut session = Session::new(builtin("jump").unwrap()).unwrap();
    ready_to_jump(&mut session);

    let one_foot = session
        .process_frame(&PoseFrame::new(3200, crouch_with(0.73, 0.85)))
        .unwrap();
    assert_eq!(one_foot.phase, "takeoff");
    assert!(one_foot.transition.is_none());
    let back = feed(&mut session, &crouch(0.85), 3300, 4000);
    assert!(back.iter().all(|o| o.phase == "takeoff"));
    assert!(session.result().is_none());
}

#[test]
fn landing_waits_for_both_feet() {
    let mut session = Session::new(builtin("jump").unwrap()).unwrap();
    ready_to_jump(&mut session);
    session.process_frame(&PoseFrame::new(3200, crouch(0.74))).unwrap();
    assert_eq!(session.phase(), "flight");

    let one_down = session
        .process_frame(&PoseFrame::new(3300, crouch_with(0.86, 0.76)))
        .unwrap();
    assert_eq!(one_down.phase, "flight");
    let both = session.process_frame(&PoseFrame::new(3400, crouch(0.86))).unwrap();
    assert_eq!(both.phase, "landed");
    assert!(both.result.is_some());
}

#[test]
fn jump_that_never_leaves_the_ground_starts_over() {
    let mut session = Session::new(builtin("jump").unwrap()).unwrap();
    ready_to_jump(&mut session);
    let out = feed(&mut session, &crouch(0.85), 3200, 8100);
    let last = out.last().unwrap();
    let t = last.transition.as_ref().unwrap();
    assert!(t.timed_out);
    assert_eq!(t.to, "preparation");
    assert_eq!(session.phase(), "preparation");
    assert!(session.result().is_none());
}

fn side_on(left_wrist: (f32, f32)) -> PoseSample {
    use BodyPart::*;
    standing_pose()
        .with(LeftShoulder, Landmark::new(0.45, 0.30, -0.10, 1.0))
        .with(RightShoulder, Landmark::new(0.55, 0.30, 0.10, 1.0))
        .with(LeftHip, Landmark::new(0.46, 0.55, -0.08, 1.0))
        .with(RightHip, Landmark::new(0.54, 0.55, 0.08, 1.0))
        .with(LeftElbow, Landmark::at(0.47, 0.20))
        .with(LeftWrist, Landmark::at(left_wrist.0, left_wrist.1))
}

#[test]
fn throw_scores_release_speed_and_footwork() {
    let mut session = Session::new(builtin("throw").unwrap()).unwrap();
    let stance = feed(&mut session, &side_on((0.42, 0.10)), 0, 3000);
    assert_eq!(stance.last().unwrap().phase, "release");

    let winding = session
        .process_frame(&PoseFrame::new(3100, side_on((0.48, 0.12))))
        .unwrap();
    assert_eq!(
        winding.instruction,
        "Throw! Bring your arm forward past your head."
    );

    let thrown = session
        .process_frame(&PoseFrame::new(3200, side_on((0.60, 0.25))))
        .unwrap();
    assert_eq!(thrown.phase, "complete");
    let result = thrown.result.unwrap();
    assert_eq!(result.component_scores["arm"], 100.0);
    assert_eq!(result.component_scores["footwork"], 100.0);
    assert_eq!(result.summary.as_deref(), Some("Excellent throwing form!"));
}

#[test]
fn extended_arm_held_for_a_second_completes_the_drill() {
    use BodyPart::*;
    let extended = standing_pose()
        .with(LeftElbow, Landmark::at(0.40, 0.20))
        .with(LeftWrist, Landmark::at(0.35, 0.10));
    let mut session = Session::new(builtin("wave_arms").unwrap()).unwrap();

    let idle = session
        .process_frame(&PoseFrame::new(0, standing_pose()))
        .unwrap();
    assert_eq!(idle.instruction, "Extend your arm from behind your head.");

    let out = feed(&mut session, &extended, 100, 1100);
    assert_eq!(
        out[0].instruction,
        "Great! You've extended your arm from behind your head."
    );
    assert!(out[..10].iter().all(|o| o.phase == "extend"));
    let done = out.last().unwrap();
    assert_eq!(done.phase, "complete");
    let result = done.result.clone().unwrap();
    assert_eq!(result.component_scores["arm"], 100.0);
    assert_eq!(result.component_scores["control"], 100.0);
    assert_eq!(result.summary.as_deref(), Some("Excellent arm extension!"));
}

#[test]
fn dropping_the_arm_restarts_the_drill_timer() {
    use BodyPart::*;
    let extended = standing_pose()
        .with(LeftElbow, Landmark::at(0.40, 0.20))
        .with(LeftWrist, Landmark::at(0.35, 0.10));
    let mut session = Session::new(builtin("wave_arms").unwrap()).unwrap();
    feed(&mut session, &extended, 0, 800);
    let dropped = session
        .process_frame(&PoseFrame::new(900, standing_pose()))
        .unwrap();
    assert_eq!(dropped.phase, "extend");
    assert_eq!(session.state().dwell_started_at, None);

    let again = feed(&mut session, &extended, 1000, 1900);
    assert!(again.iter().all(|o| o.phase == "extend"));
    let done = session.process_frame(&PoseFrame::new(2000, extended)).unwrap();
    assert_eq!(done.phase, "complete");
}
