//! Vehicle state staging and decision tests

use traffic_flow::simulation::{
    LaneId, PendingState, SimError, SimWorld, VehicleId, VehicleState, VEHICLE_LENGTH,
};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

fn single_vehicle_world(position: f64, target_speed: f64) -> (SimWorld, VehicleId) {
    let mut world = SimWorld::new(2);
    let id = world
        .spawn_vehicle(position, target_speed, LaneId(0))
        .expect("spawn vehicle");
    (world, id)
}

#[test]
fn test_pending_state_coalesces_unset_fields() {
    let pending = PendingState {
        position: Some(1.0),
        speed: Some(2.0),
        lane: None,
    };
    let committed = VehicleState::new(1.0, 3.0, LaneId(7));

    let merged = pending.coalesce(&committed);
    assert_eq!(merged, VehicleState::new(1.0, 2.0, LaneId(7)));
}

#[test]
fn test_undefined_pending_state_keeps_committed() {
    let committed = VehicleState::new(4.0, 5.0, LaneId(1));
    let pending = PendingState::undefined();

    assert!(pending.is_undefined());
    assert_eq!(pending.coalesce(&committed), committed);
}

#[test]
fn test_pending_merge_prefers_left_operand() {
    let left = PendingState {
        position: None,
        speed: Some(2.0),
        lane: None,
    };
    let right = PendingState {
        position: Some(9.0),
        speed: Some(8.0),
        lane: None,
    };

    let merged = left.merge(&right);
    assert_eq!(merged.position, Some(9.0));
    assert_eq!(merged.speed, Some(2.0));
    assert_eq!(merged.lane, None);
}

#[test]
fn test_speed_initialized_to_target_speed() {
    let (world, id) = single_vehicle_world(5.0, 10.0);
    let vehicle = world.vehicle(id).unwrap();
    assert_eq!(vehicle.speed(), 10.0);
    assert_eq!(vehicle.position(), 5.0);
    assert_eq!(vehicle.lane(), LaneId(0));
}

#[test]
fn test_setters_only_stage_until_commit() {
    let (mut world, id) = single_vehicle_world(5.0, 10.0);
    {
        let vehicle = world.vehicle_mut(id).unwrap();
        vehicle.set_speed(50.0);
        vehicle.set_position(55.0);
        assert_eq!(vehicle.speed(), 10.0);
        assert_eq!(vehicle.position(), 5.0);
    }

    world.commit().unwrap();
    let vehicle = world.vehicle(id).unwrap();
    assert_eq!(vehicle.speed(), 50.0);
    assert_eq!(vehicle.position(), 55.0);
    assert!(vehicle.pending().is_undefined());
}

#[test]
fn test_set_lane_and_commit_moves_membership() {
    let (mut world, id) = single_vehicle_world(5.0, 10.0);
    world.vehicle_mut(id).unwrap().set_lane(LaneId(1));
    world.commit().unwrap();

    assert_eq!(world.vehicle(id).unwrap().lane(), LaneId(1));
    assert!(!world.lane(LaneId(0)).unwrap().contains(id));
    assert!(world.lane(LaneId(1)).unwrap().contains(id));
}

#[test]
fn test_commit_without_staged_changes_is_idempotent() {
    let (mut world, id) = single_vehicle_world(5.0, 10.0);
    let before = *world.vehicle(id).unwrap().state();

    world.commit().unwrap();
    world.commit().unwrap();

    let vehicle = world.vehicle(id).unwrap();
    assert_eq!(*vehicle.state(), before);
    assert!(vehicle.pending().is_undefined());
    assert!(world.lane(LaneId(0)).unwrap().contains(id));
}

#[test]
fn test_next_predicted_position_uses_committed_speed() {
    let (world, id) = single_vehicle_world(5.0, 15.0);
    assert_eq!(world.vehicle(id).unwrap().next_predicted_position(), 20.0);
}

#[test]
fn test_next_predicted_position_uses_staged_speed() {
    let (mut world, id) = single_vehicle_world(5.0, 10.0);
    let vehicle = world.vehicle_mut(id).unwrap();
    vehicle.set_speed(20.0);
    assert_eq!(vehicle.next_predicted_position(), 25.0);
}

#[test]
fn test_cruise() {
    let (mut world, id) = single_vehicle_world(5.0, 10.0);
    world.vehicle_mut(id).unwrap().cruise(None);
    world.commit().unwrap();
    assert_eq!(world.vehicle(id).unwrap().position(), 15.0);

    world.vehicle_mut(id).unwrap().set_speed(15.0);
    world.vehicle_mut(id).unwrap().cruise(None);
    world.commit().unwrap();
    assert_eq!(world.vehicle(id).unwrap().position(), 30.0);
}

#[test]
fn test_change_lane_at_speed() {
    let (mut world, id) = single_vehicle_world(10.0, 5.0);
    world.vehicle_mut(id).unwrap().change_lane(LaneId(1), Some(7.0));
    world.commit().unwrap();

    let vehicle = world.vehicle(id).unwrap();
    assert_eq!(vehicle.lane(), LaneId(1));
    assert_eq!(vehicle.speed(), 7.0);
    // change_lane alone does not advance the vehicle
    assert_eq!(vehicle.position(), 10.0);
}

#[test]
fn test_equality_is_identity() {
    let mut world = SimWorld::new(2);
    let a = world.spawn_vehicle(10.0, 10.0, LaneId(0)).unwrap();
    let b = world.spawn_vehicle(10.0, 10.0, LaneId(1)).unwrap();

    world.vehicle_mut(b).unwrap().set_lane(LaneId(0));
    world.commit().unwrap();

    let (veh_a, veh_b) = (world.vehicle(a).unwrap(), world.vehicle(b).unwrap());
    assert!(veh_a.shares_spot_with(veh_b));
    assert_ne!(veh_a, veh_b);
    assert_eq!(veh_a, veh_a);
}

#[test]
fn test_max_speed_on_current_lane() {
    let mut world = SimWorld::new(1);
    let veh1 = world.spawn_vehicle(10.0, 5.0, LaneId(0)).unwrap();
    let veh2 = world.spawn_vehicle(15.0, 1.0, LaneId(0)).unwrap();
    let veh3 = world.spawn_vehicle(100.0, 5.0, LaneId(0)).unwrap();

    let max_speed = |id| world.vehicle(id).unwrap().max_speed_on(&world, None).unwrap();
    assert_close(max_speed(veh1), 16.0 - VEHICLE_LENGTH - 10.0);
    assert_eq!(max_speed(veh2), 1.0);
    assert_eq!(max_speed(veh3), 5.0);
}

#[test]
fn test_max_speed_on_different_lane() {
    let mut world = SimWorld::new(2);
    let veh1 = world.spawn_vehicle(10.0, 5.0, LaneId(0)).unwrap();
    world.spawn_vehicle(15.0, 1.0, LaneId(1)).unwrap();
    world.spawn_vehicle(100.0, 5.0, LaneId(1)).unwrap();

    let speed = world
        .vehicle(veh1)
        .unwrap()
        .max_speed_on(&world, Some(LaneId(1)))
        .unwrap();
    assert_close(speed, 16.0 - VEHICLE_LENGTH - 10.0);
}

#[test]
fn test_max_speed_on_unknown_lane_fails() {
    let (world, id) = single_vehicle_world(0.0, 5.0);
    let result = world.vehicle(id).unwrap().max_speed_on(&world, Some(LaneId(9)));
    assert_eq!(result, Err(SimError::UnknownLane(LaneId(9))));
}

#[test]
fn test_negative_speed_on_own_lane_is_an_accident() {
    let mut world = SimWorld::new(2);
    let follower = world.spawn_vehicle(10.0, 5.0, LaneId(0)).unwrap();
    world.spawn_vehicle(12.0, 1.0, LaneId(0)).unwrap();

    let result = world.vehicle(follower).unwrap().max_speed_on(&world, None);
    assert!(matches!(
        result,
        Err(SimError::VehicleAccident { vehicle, lane: LaneId(0), .. }) if vehicle == follower
    ));
}

#[test]
fn test_negative_speed_on_other_lane_is_reported() {
    let mut world = SimWorld::new(2);
    let veh = world.spawn_vehicle(10.0, 5.0, LaneId(0)).unwrap();
    world.spawn_vehicle(12.0, 1.0, LaneId(1)).unwrap();

    let speed = world
        .vehicle(veh)
        .unwrap()
        .max_speed_on(&world, Some(LaneId(1)))
        .unwrap();
    assert_close(speed, 13.0 - 10.0 - VEHICLE_LENGTH);
    assert!(speed < 0.0);
}

#[test]
fn test_can_change_lane() {
    let mut world = SimWorld::new(2);
    let (lane1, lane2) = (LaneId(0), LaneId(1));

    let veh1_lane1 = world.spawn_vehicle(10.0, 5.0, lane1).unwrap();
    let veh2_lane1 = world.spawn_vehicle(22.0, 4.0, lane1).unwrap();
    let veh3_lane1 = world.spawn_vehicle(99.0, 10.0, lane1).unwrap();
    let veh1_lane2 = world.spawn_vehicle(11.0, 3.0, lane2).unwrap();
    let veh2_lane2 = world.spawn_vehicle(39.0, 7.0, lane2).unwrap();

    let can = |id, lane| world.vehicle(id).unwrap().can_change_lane(&world, lane);
    assert!(!can(veh1_lane1, Some(lane2)));
    assert!(!can(veh1_lane2, Some(lane1)));
    assert!(can(veh2_lane1, Some(lane2)));
    assert!(can(veh2_lane2, Some(lane1)));
    assert!(can(veh3_lane1, Some(lane2)));

    assert!(can(veh1_lane1, Some(lane1)));
    assert!(!can(veh1_lane1, None));
    assert!(!can(veh1_lane1, Some(LaneId(5))));
}

#[test]
fn test_cannot_change_onto_occupied_position() {
    let mut world = SimWorld::new(2);
    let veh = world.spawn_vehicle(30.0, 1.0, LaneId(0)).unwrap();
    world.spawn_vehicle(30.0, 20.0, LaneId(1)).unwrap();

    assert!(!world.vehicle(veh).unwrap().can_change_lane(&world, Some(LaneId(1))));
}

#[test]
fn test_calculate() {
    let mut world = SimWorld::new(2);
    let (lane1, lane2) = (LaneId(0), LaneId(1));

    let veh1_lane1 = world.spawn_vehicle(21.0, 5.0, lane1).unwrap();
    let veh2_lane1 = world.spawn_vehicle(25.0, 4.0, lane1).unwrap();
    let veh3_lane1 = world.spawn_vehicle(27.0, 3.0, lane1).unwrap();
    let veh4_lane1 = world.spawn_vehicle(99.0, 6.0, lane1).unwrap();
    let veh1_lane2 = world.spawn_vehicle(21.0, 3.0, lane2).unwrap();

    let decide = |id| world.vehicle(id).unwrap().calculate(&world).unwrap();

    // Nobody ahead: cruise, own lane wins the tie with lane 2
    let request = decide(veh4_lane1);
    assert_eq!((request.vehicle, request.lane), (veh4_lane1, lane1));
    assert_close(request.speed, 6.0);

    let request = decide(veh3_lane1);
    assert_eq!(request.lane, lane1);
    assert_close(request.speed, 3.0);

    // Blocked in lane 1, free in lane 2
    let request = decide(veh2_lane1);
    assert_eq!(request.lane, lane2);
    assert_close(request.speed, 4.0);

    // Lane 2 is occupied at the same position: brake
    let request = decide(veh1_lane1);
    assert_eq!(request.lane, lane1);
    assert_close(request.speed, 3.2);

    let request = decide(veh1_lane2);
    assert_eq!(request.lane, lane2);
    assert_close(request.speed, 3.0);
}

#[test]
fn test_calculate_prefers_left_over_right_on_ties() {
    let mut world = SimWorld::new(3);
    let veh = world.spawn_vehicle(0.0, 10.0, LaneId(1)).unwrap();
    world.spawn_vehicle(6.0, 1.0, LaneId(1)).unwrap();

    let request = world.vehicle(veh).unwrap().calculate(&world).unwrap();
    assert_eq!(request.lane, LaneId(0));
    assert_close(request.speed, 10.0);
}

#[test]
fn test_calculate_does_not_stage_anything() {
    let mut world = SimWorld::new(2);
    let veh = world.spawn_vehicle(0.0, 10.0, LaneId(0)).unwrap();
    world.spawn_vehicle(6.0, 1.0, LaneId(0)).unwrap();

    let requests = world.decide().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(world.vehicles().all(|vehicle| vehicle.pending().is_undefined()));
    assert!(world.requests_for(LaneId(1)).is_empty());
    assert_eq!(world.vehicle(veh).unwrap().position(), 0.0);
}
