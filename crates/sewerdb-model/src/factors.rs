//! Factors domain: pipes and their physical, environmental and operational context.

use chrono::NaiveDate;

entity! {
    /// A sewer pipe segment.
    Pipe as "Pipe" {
        key pipe_id: Option<i64> => "Pipe_ID";
        installation_year: Option<i64> => "Installation_year",
        /// Internal diameter in millimetres.
        diameter: Option<i64> => "Diameter",
        material: Option<String> => "Material" (max 20),
        pipe_length: Option<f64> => "Pipe_length",
        slope: Option<f64> => "Slope",
        depth: Option<f64> => "Depth",
        sewage_type: Option<String> => "Sewage_type",
        groundwater_level: Option<f64> => "Groundwater_level",
        trees_nearby: Option<i64> => "Trees_nearby",
        shape: Option<String> => "Shape",
        land_use_and_cover: Option<String> => "Land_use_and_cover",
        bedding: Option<String> => "Bedding",
        joint_type: Option<String> => "Joint_type",
        population: Option<i64> => "Population",
        sewer_connections: Option<i64> => "Sewer_connections",
        climatic_condition: Option<f64> => "Climatic_condition",
        sewer_category: Option<String> => "Sewer_category",
        weather_station_id: Option<i64> => "Weather_station_ID",
        installation_method: Option<String> => "Installation_method",
        backfill_type: Option<String> => "Backfill_type",
        manufacturer: Option<String> => "Manufacturer",
        construction_quality: Option<String> => "Construction_quality",
        lining_type: Option<String> => "Lining_type",
        design_life: Option<i64> => "Design_life",
        ground_level: Option<f64> => "Ground_level",
        wall_thickness: Option<f64> => "Wall_thickness",
        tidal_influence: Option<bool> => "Tidal_influence",
        frost_action: Option<bool> => "Frost_Action",
        water_quality: Option<f64> => "Water_quality",
        surcharge: Option<bool> => "Surcharge",
        no_of_commercial_properties: Option<i64> => "No_of_commercial_properties",
        no_of_direct_upstream_users: Option<i64> => "No_of_direct_upstream_users",
        /// Most recent seismic event of note. Informational only; the
        /// authoritative link is [`PipeSeismicImpact`].
        seismic_activity_id: Option<i64> => "Seismic_activity_ID",
        soil_ph: Option<f64> => "Soil_pH",
        soil_type: Option<String> => "Soil_type",
        soil_moisture: Option<String> => "Soil_moisture",
        soil_resistivity: Option<f64> => "Soil_resistivity",
        traffic_load: Option<String> => "Traffic_load",
        road_above: Option<bool> => "Road_above",
        building_above: Option<bool> => "Building_above",
        manhole_up_id: Option<i64> => "Manhole_up_ID",
        manhole_down_id: Option<i64> => "Manhole_down_ID",
    }
}

entity! {
    /// A fixed climate-observation point.
    WeatherStation as "WeatherStation" {
        key weather_station_id: Option<i64> => "Weather_station_ID";
        x_coordinate: Option<f64> => "X_coordinate",
        y_coordinate: Option<f64> => "Y_coordinate",
    }
}

entity! {
    /// Rainfall observation.
    Rainfall as "Rainfall" {
        key id: Option<i64> => "id";
        weather_station_id: Option<i64> => "Weather_station_ID",
        observation_time: Option<NaiveDate> => "Observation_time",
        /// Aggregation frequency, e.g. daily or monthly.
        frequency: Option<String> => "Frequency",
        /// Statistic kind, e.g. mean or max.
        statistics: Option<String> => "Statistics",
        intensity: Option<f64> => "Intensity",
    }
}

entity! {
    /// Air humidity observation.
    AirHumidity as "AirHumidity" {
        key air_humidity_id: Option<i64> => "air_humidity_id";
        weather_station_id: Option<i64> => "Weather_station_ID",
        observation_time: Option<NaiveDate> => "Observation_time",
        frequency: Option<String> => "Frequency",
        statistics: Option<String> => "Statistics",
        humidity_value: Option<f64> => "Humidity_value",
    }
}

entity! {
    /// Air temperature observation.
    AirTemperature as "AirTemperature" {
        key id: Option<i64> => "id";
        weather_station_id: Option<i64> => "Weather_station_ID",
        observation_time: Option<NaiveDate> => "Observation_time",
        frequency: Option<String> => "Frequency",
        statistics: Option<String> => "Statistics",
        temperature_value: Option<f64> => "Temperature_value",
    }
}

entity! {
    /// A discrete seismic event.
    SeismicActivity as "SeismicActivity" {
        key seismic_activity_id: Option<i64> => "Seismic_activity_ID";
        seismic_type: Option<String> => "Seismic_type",
        reference_date: Option<NaiveDate> => "Reference_date",
        magnitude: Option<f64> => "Magnitude",
        depth_km: Option<f64> => "Depth_km",
        x_coordinate: Option<f64> => "X_coordinate",
        y_coordinate: Option<f64> => "Y_coordinate",
        peak_ground_acceleration: Option<f64> => "peak_ground_acceleration",
    }
}

entity! {
    /// A seismic event affecting a pipe.
    ///
    /// The same pair may be recorded more than once.
    PipeSeismicImpact as "PipeSeismicImpact" {
        key id: Option<i64> => "id", composite("Pipe_ID", "Seismic_activity_ID");
        pipe_id: i64 => "Pipe_ID",
        seismic_activity_id: i64 => "Seismic_activity_ID",
    }
}

entity! {
    /// A network access or connection node.
    Manhole as "Manhole" {
        key manhole_id: Option<i64> => "Manhole_ID";
        x_coordinate: Option<f64> => "X_coordinate",
        y_coordinate: Option<f64> => "Y_coordinate",
    }
}

entity! {
    /// Flow and capacity metrics of a pipe, keyed by the pipe itself.
    HydraulicProperties as "HydraulicProperties" {
        key pipe_id: i64 => "Pipe_ID";
        wet_peak_flow_rate: Option<f64> => "Wet_peak_flow_rate",
        dry_peak_flow_rate: Option<f64> => "Dry_peak_flow_rate",
        wet_peak_velocity: Option<f64> => "Wet_peak_velocity",
        dry_peak_velocity: Option<f64> => "Dry_peak_velocity",
        pipe_capacity: Option<f64> => "Pipe_capacity",
    }
}

entity! {
    /// A maintenance, repair or renewal action on a pipe segment.
    InterventionHistory as "InterventionHistory" {
        key intervention_id: Option<i64> => "Intervention_ID";
        start_date: Option<NaiveDate> => "Start_date",
        end_date: Option<NaiveDate> => "End_date",
        type_of_intervention: Option<String> => "Type_of_intervention",
        planned_or_reactive: Option<String> => "Planned_or_reactive",
        status: Option<String> => "Status",
        priority: Option<String> => "Priority",
        pipe_id: i64 => "Pipe_ID",
        /// Distance from the upstream end where the work starts, in metres.
        position_start: Option<f64> => "Position_start",
        position_end: Option<f64> => "Position_end",
        comments: Option<String> => "Comments",
    }
}

impl Pipe {
    /// Both manhole roles reference the same node.
    pub fn is_zero_length(&self) -> bool {
        matches!(
            (self.manhole_up_id, self.manhole_down_id),
            (Some(up), Some(down)) if up == down
        )
    }
}

impl PipeSeismicImpact {
    /// Record that `activity` affects `pipe`.
    pub fn new(pipe: i64, activity: i64) -> Self {
        Self {
            id: None,
            pipe_id: pipe,
            seismic_activity_id: activity,
        }
    }
}

impl HydraulicProperties {
    /// Empty metrics for a pipe.
    pub fn for_pipe(pipe: i64) -> Self {
        Self {
            pipe_id: pipe,
            ..Default::default()
        }
    }
}
