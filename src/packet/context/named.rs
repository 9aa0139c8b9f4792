//! The named context fields.
//!
//! One table drives everything a field needs: its [`FieldId`] constant, the
//! typed getter and setter on [`ContextPacket`], and its reflection name and
//! type. Entries are in storage order.

use super::ContextPacket;
use super::cif::{CifPlane, FieldId};
use super::encoding::{
    DeviceId, Fixed16, Fixed32, Format, Gain, Hz, I64, Opaque, Pair16, PositiveHz, RecordField,
    SizedStructure, StateEvents, U32, U64,
};
use crate::fields::{FieldType, FieldValue, Value, expect_value};
use crate::packet::{PayloadFormat, StateEventBits};
use crate::record::{ContextAssocLists, Ephemeris, GeoSentences, Geolocation};
use crate::{Result, VrtError};

macro_rules! context_fields {
    ($(
        $(#[$doc:meta])*
        $plane:ident $bit:literal $id:ident $get:ident $set:ident $name:literal : $codec:ty => $value:ty;
    )*) => {
        impl FieldId {
            $(
                $(#[$doc])*
                pub const $id: FieldId = FieldId::new(CifPlane::$plane, $bit);
            )*

            /// Every named field in storage order.
            pub const ALL: &'static [FieldId] = &[$(FieldId::$id),*];

            /// Reflection name of the field.
            pub fn name(self) -> &'static str {
                match self {
                    $(FieldId::$id => $name,)*
                    _ => "Unknown",
                }
            }

            /// Runtime type of the field's value.
            pub fn value_type(self) -> Option<FieldType> {
                match self {
                    $(FieldId::$id => Some(<$value as FieldValue>::FIELD_TYPE),)*
                    _ => None,
                }
            }
        }

        impl ContextPacket<'_> {
            $(
                $(#[$doc])*
                pub fn $get(&self) -> Option<$value> {
                    self.read_field::<$codec>(FieldId::$id)
                }

                #[doc = concat!("Set the ", $name, " field; `None` removes it.")]
                pub fn $set(&mut self, value: Option<$value>) -> Result<()> {
                    self.write_field::<$codec>(FieldId::$id, value.as_ref())
                }
            )*

            /// Value of `field` as a reflected [`Value`].
            pub fn field_value(&self, field: FieldId) -> Option<Value> {
                match field {
                    $(FieldId::$id => self.$get().map(FieldValue::into_value),)*
                    _ => None,
                }
            }

            /// Set `field` from a reflected [`Value`]; `None` removes it.
            pub fn set_field_value(&mut self, field: FieldId, value: Option<Value>) -> Result<()> {
                match field {
                    $(FieldId::$id => {
                        let value = expect_value::<$value>($name, value)?;
                        self.$set(value)
                    })*
                    other => Err(VrtError::invalid_argument("field", format!("{other:?} has no value type"))),
                }
            }
        }
    };
}

context_fields! {
    /// Stream identifier of the reference point.
    Cif0 30 REFERENCE_POINT_ID reference_point_identifier set_reference_point_identifier "ReferencePointIdentifier": U32 => u32;
    /// Bandwidth in Hz.
    Cif0 29 BANDWIDTH bandwidth set_bandwidth "Bandwidth": PositiveHz => f64;
    /// IF reference frequency in Hz.
    Cif0 28 IF_REFERENCE_FREQUENCY if_reference_frequency set_if_reference_frequency "IfReferenceFrequency": Hz => f64;
    /// RF reference frequency in Hz.
    Cif0 27 RF_REFERENCE_FREQUENCY rf_reference_frequency set_rf_reference_frequency "RfReferenceFrequency": Hz => f64;
    /// RF reference frequency offset in Hz.
    Cif0 26 RF_REFERENCE_FREQUENCY_OFFSET rf_reference_frequency_offset set_rf_reference_frequency_offset
        "RfReferenceFrequencyOffset": Hz => f64;
    /// IF band offset in Hz.
    Cif0 25 IF_BAND_OFFSET if_band_offset set_if_band_offset "IfBandOffset": Hz => f64;
    /// Reference level in dBm.
    Cif0 24 REFERENCE_LEVEL reference_level set_reference_level "ReferenceLevel": Fixed16<7> => f64;
    /// Gain `[stage 1, stage 2]` in dB.
    Cif0 23 GAIN gain set_gain "Gain": Gain => [f64; 2];
    /// Over-range sample count for the preceding interval.
    Cif0 22 OVER_RANGE_COUNT over_range_count set_over_range_count "OverRangeCount": U32 => u32;
    /// Sample rate in Hz.
    Cif0 21 SAMPLE_RATE sample_rate set_sample_rate "SampleRate": PositiveHz => f64;
    /// Timestamp adjustment in picoseconds.
    Cif0 20 TIMESTAMP_ADJUSTMENT timestamp_adjustment set_timestamp_adjustment "TimeStampAdjustment": I64 => i64;
    /// Timestamp calibration time (integer seconds).
    Cif0 19 TIMESTAMP_CALIBRATION timestamp_calibration set_timestamp_calibration "TimeStampCalibration": U32 => u32;
    /// Device temperature in degrees Celsius.
    Cif0 18 TEMPERATURE temperature set_temperature "Temperature": Fixed16<6> => f64;
    /// Device identifier, `0x00OOOOOO_0000DDDD`.
    Cif0 17 DEVICE_ID device_identifier set_device_identifier "DeviceIdentifier": DeviceId => u64;
    /// State and event indicators.
    Cif0 16 STATE_EVENTS state_event_indicators set_state_event_indicators "StateEventIndicators": StateEvents => StateEventBits;
    /// Payload format of the paired data stream.
    Cif0 15 PAYLOAD_FORMAT payload_format set_payload_format "DataPayloadFormat": Format => PayloadFormat;
    /// Formatted GPS geolocation.
    Cif0 14 FORMATTED_GPS formatted_gps set_formatted_gps "FormattedGps": RecordField<Geolocation> => Geolocation;
    /// Formatted INS geolocation.
    Cif0 13 FORMATTED_INS formatted_ins set_formatted_ins "FormattedIns": RecordField<Geolocation> => Geolocation;
    /// ECEF ephemeris.
    Cif0 12 ECEF_EPHEMERIS ecef_ephemeris set_ecef_ephemeris "EcefEphemeris": RecordField<Ephemeris> => Ephemeris;
    /// Relative ephemeris.
    Cif0 11 RELATIVE_EPHEMERIS relative_ephemeris set_relative_ephemeris "RelativeEphemeris": RecordField<Ephemeris> => Ephemeris;
    /// Stream identifier of the ephemeris reference.
    Cif0 10 EPHEMERIS_REFERENCE_ID ephemeris_reference_identifier set_ephemeris_reference_identifier
        "EphemerisReferenceIdentifier": U32 => u32;
    /// GPS ASCII sentences.
    Cif0 9 GPS_ASCII gps_ascii set_gps_ascii "GpsAscii": RecordField<GeoSentences> => GeoSentences;
    /// Context association lists.
    Cif0 8 CONTEXT_ASSOCIATION_LISTS context_association_lists set_context_association_lists
        "ContextAssociationLists": RecordField<ContextAssocLists> => ContextAssocLists;

    /// Phase offset in radians.
    Cif1 31 PHASE_OFFSET phase_offset set_phase_offset "PhaseOffset": Fixed16<7> => f64;
    /// Polarization `[tilt, ellipticity]` in radians.
    Cif1 30 POLARIZATION polarization set_polarization "Polarization": Pair16<13> => [f64; 2];
    /// 3-D pointing vector `[elevation, azimuth]` in degrees.
    Cif1 29 POINTING_VECTOR pointing_vector set_pointing_vector "PointingVector": Pair16<7> => [f64; 2];
    /// 3-D pointing vector structure.
    Cif1 28 POINTING_VECTOR_STRUCTURE pointing_vector_structure set_pointing_vector_structure
        "PointingVectorStructure": SizedStructure => Vec<u8>;
    Cif1 27 SPATIAL_SCAN_TYPE spatial_scan_type set_spatial_scan_type "SpatialScanType": U32 => u32;
    Cif1 26 SPATIAL_REFERENCE_TYPE spatial_reference_type set_spatial_reference_type "SpatialReferenceType": U32 => u32;
    /// Beam width `[horizontal, vertical]` in degrees.
    Cif1 25 BEAM_WIDTH beam_width set_beam_width "BeamWidth": Pair16<7> => [f64; 2];
    /// Range in metres.
    Cif1 24 RANGE range set_range "Range": Fixed32<6> => f64;
    /// `[Eb/No in dB, bit error rate]`.
    Cif1 20 EB_NO_BER eb_no_ber set_eb_no_ber "EbNoBer": Pair16<7> => [f64; 2];
    /// Threshold `[stage 1, stage 2]` in dB.
    Cif1 19 THRESHOLD threshold set_threshold "Threshold": Pair16<7> => [f64; 2];
    /// 1 dB compression point in dBm.
    Cif1 18 COMPRESSION_POINT compression_point set_compression_point "CompressionPoint": Fixed16<7> => f64;
    /// `[second-order, third-order]` intercept points in dBm.
    Cif1 17 INTERCEPT_POINTS intercept_points set_intercept_points "InterceptPoints": Pair16<7> => [f64; 2];
    /// `[SNR, noise figure]` in dB.
    Cif1 16 SNR_NOISE_FIGURE snr_noise_figure set_snr_noise_figure "SnrNoiseFigure": Pair16<7> => [f64; 2];
    /// Auxiliary frequency in Hz.
    Cif1 15 AUX_FREQUENCY aux_frequency set_aux_frequency "AuxFrequency": Hz => f64;
    /// Auxiliary gain `[stage 1, stage 2]` in dB.
    Cif1 14 AUX_GAIN aux_gain set_aux_gain "AuxGain": Gain => [f64; 2];
    /// Auxiliary bandwidth in Hz.
    Cif1 13 AUX_BANDWIDTH aux_bandwidth set_aux_bandwidth "AuxBandwidth": PositiveHz => f64;
    /// Array of CIFs structure.
    Cif1 11 ARRAY_OF_CIFS array_of_cifs set_array_of_cifs "ArrayOfCifs": SizedStructure => Vec<u8>;
    /// Spectrum descriptor.
    Cif1 10 SPECTRUM spectrum set_spectrum "Spectrum": Opaque<52> => [u8; 52];
    /// Sector/step-scan structure.
    Cif1 9 SECTOR_SCAN sector_scan set_sector_scan "SectorScanStep": SizedStructure => Vec<u8>;
    /// Index list structure.
    Cif1 7 INDEX_LIST index_list set_index_list "IndexList": SizedStructure => Vec<u8>;
    Cif1 6 DISCRETE_IO_32 discrete_io_32 set_discrete_io_32 "DiscreteIo32": U32 => u32;
    Cif1 5 DISCRETE_IO_64 discrete_io_64 set_discrete_io_64 "DiscreteIo64": U64 => u64;
    Cif1 4 HEALTH_STATUS health_status set_health_status "HealthStatus": U32 => u32;
    /// Compliance level of the sender.
    Cif1 3 SPEC_COMPLIANCE spec_compliance set_spec_compliance "V49SpecCompliance": U32 => u32;
    Cif1 2 VERSION_BUILD_CODE version_build_code set_version_build_code "VersionBuildCode": U32 => u32;
    Cif1 1 BUFFER_SIZE buffer_size set_buffer_size "BufferSize": U64 => u64;

    Cif2 31 BIND bind set_bind "Bind": U32 => u32;
    Cif2 30 CITED_SID cited_sid set_cited_sid "CitedSid": U32 => u32;
    Cif2 29 SIBLING_SID sibling_sid set_sibling_sid "SiblingSid": U32 => u32;
    Cif2 28 PARENT_SID parent_sid set_parent_sid "ParentSid": U32 => u32;
    Cif2 27 CHILD_SID child_sid set_child_sid "ChildSid": U32 => u32;
    Cif2 26 CITED_MESSAGE_ID cited_message_id set_cited_message_id "CitedMessageId": U32 => u32;
    Cif2 25 CONTROLLEE_ID controllee_id set_controllee_id "ControlleeId": U32 => u32;
    Cif2 24 CONTROLLEE_UUID controllee_uuid set_controllee_uuid "ControlleeUuid": Opaque<16> => [u8; 16];
    Cif2 23 CONTROLLER_ID controller_id set_controller_id "ControllerId": U32 => u32;
    Cif2 22 CONTROLLER_UUID controller_uuid set_controller_uuid "ControllerUuid": Opaque<16> => [u8; 16];
    Cif2 21 INFORMATION_SOURCE information_source set_information_source "InformationSource": U32 => u32;
    Cif2 20 TRACK_ID track_id set_track_id "TrackId": U32 => u32;
    Cif2 19 COUNTRY_CODE country_code set_country_code "CountryCode": U32 => u32;
    Cif2 18 OPERATOR operator set_operator "Operator": U32 => u32;
    Cif2 17 PLATFORM_CLASS platform_class set_platform_class "PlatformClass": U32 => u32;
    Cif2 16 PLATFORM_INSTANCE platform_instance set_platform_instance "PlatformInstance": U32 => u32;
    Cif2 15 PLATFORM_DISPLAY platform_display set_platform_display "PlatformDisplay": U32 => u32;
    Cif2 14 EMS_DEVICE_CLASS ems_device_class set_ems_device_class "EmsDeviceClass": U32 => u32;
    Cif2 13 EMS_DEVICE_TYPE ems_device_type set_ems_device_type "EmsDeviceType": U32 => u32;
    Cif2 12 EMS_DEVICE_INSTANCE ems_device_instance set_ems_device_instance "EmsDeviceInstance": U32 => u32;
    Cif2 11 MODULATION_CLASS modulation_class set_modulation_class "ModulationClass": U32 => u32;
    Cif2 10 MODULATION_TYPE modulation_type set_modulation_type "ModulationType": U32 => u32;
    Cif2 9 FUNCTION_ID function_id set_function_id "FunctionId": U32 => u32;
    Cif2 8 MODE_ID mode_id set_mode_id "ModeId": U32 => u32;
    Cif2 7 EVENT_ID event_id set_event_id "EventId": U32 => u32;
    Cif2 6 FUNCTION_PRIORITY_ID function_priority_id set_function_priority_id "FunctionPriorityId": U32 => u32;
    Cif2 5 COMMUNICATION_PRIORITY_ID communication_priority_id set_communication_priority_id
        "CommunicationPriorityId": U32 => u32;
    Cif2 4 RF_FOOTPRINT rf_footprint set_rf_footprint "RfFootprint": U32 => u32;
    Cif2 3 RF_FOOTPRINT_RANGE rf_footprint_range set_rf_footprint_range "RfFootprintRange": U32 => u32;

    Cif3 31 TIMESTAMP_DETAILS timestamp_details set_timestamp_details "TimeStampDetails": U64 => u64;
    /// Timestamp skew in picoseconds.
    Cif3 30 TIMESTAMP_SKEW timestamp_skew set_timestamp_skew "TimeStampSkew": I64 => i64;
    /// Rise time in picoseconds.
    Cif3 27 RISE_TIME rise_time set_rise_time "RiseTime": I64 => i64;
    Cif3 26 FALL_TIME fall_time set_fall_time "FallTime": I64 => i64;
    Cif3 25 OFFSET_TIME offset_time set_offset_time "OffsetTime": I64 => i64;
    Cif3 24 PULSE_WIDTH pulse_width set_pulse_width "PulseWidth": I64 => i64;
    Cif3 23 PERIOD period set_period "Period": I64 => i64;
    Cif3 22 DURATION duration set_duration "Duration": I64 => i64;
    Cif3 21 DWELL dwell set_dwell "Dwell": I64 => i64;
    Cif3 20 JITTER jitter set_jitter "Jitter": I64 => i64;
    Cif3 17 AGE age set_age "Age": I64 => i64;
    Cif3 16 SHELF_LIFE shelf_life set_shelf_life "ShelfLife": I64 => i64;
    /// Air temperature in degrees Celsius.
    Cif3 7 AIR_TEMPERATURE air_temperature set_air_temperature "AirTemperature": Fixed16<6> => f64;
    /// Sea or ground temperature in degrees Celsius.
    Cif3 6 SEA_GROUND_TEMPERATURE sea_ground_temperature set_sea_ground_temperature "SeaGroundTemperature": Fixed16<6> => f64;
    /// Relative humidity in percent.
    Cif3 5 HUMIDITY humidity set_humidity "Humidity": Fixed16<7> => f64;
    Cif3 4 BAROMETRIC_PRESSURE barometric_pressure set_barometric_pressure "BarometricPressure": U32 => u32;
    Cif3 3 SEA_SWELL_STATE sea_swell_state set_sea_swell_state "SeaSwellState": U32 => u32;
    Cif3 2 TROPOSPHERIC_STATE tropospheric_state set_tropospheric_state "TroposphericState": U32 => u32;
    Cif3 1 NETWORK_ID network_id set_network_id "NetworkId": U32 => u32;
}
